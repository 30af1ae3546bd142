//! Session client: the state machine plus the collaborators it talks to.

pub mod backend;
pub mod controller;
pub mod storage;

pub use backend::{
    HttpIdentityDirectory, HttpPrimaryBackend, IdentityDirectory, PasswordReset, PrimaryBackend,
};
pub use controller::{SessionController, SessionSnapshot, SessionState, SessionStateKind};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
