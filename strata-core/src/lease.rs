/// A native session handle plus the knowledge of whether this executor
/// opened it.
///
/// Sessions borrowed from an active transaction stay alive when the
/// executor finishes; only sessions the executor opened itself are released
/// by it.
#[derive(Debug)]
pub struct Leased<S> {
    session: S,
    owned: bool,
}

impl<S> Leased<S> {
    /// A session borrowed from an active transaction; the executor must not
    /// close it.
    pub fn borrowed(session: S) -> Self {
        Self {
            session,
            owned: false,
        }
    }

    /// A session this executor opened and must close.
    pub fn owned(session: S) -> Self {
        Self {
            session,
            owned: true,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Hand back the session for closing only when it is owned; a borrowed
    /// session is dropped without releasing the underlying resource.
    pub fn release(self) -> Option<S> {
        self.owned.then_some(self.session)
    }
}
