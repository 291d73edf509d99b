// Porchlight Shared Library
// Hardware-independent core of the firmware: credential vault, reset ritual,
// heartbeat and run loop. Builds on the host so it can be tested without a board.

pub mod alert;
pub mod boot;
pub mod config;
pub mod console;
pub mod crypto;
pub mod debounce;
pub mod error;
pub mod heartbeat;
pub mod network;
pub mod profile;
pub mod reset;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use alert::{Alert, DeviceIo, Output};
pub use config::RuntimeConfig;
pub use crypto::{decrypt_password, derive_key, encrypt_password, EncryptedBlob, SymmetricKey};
pub use error::{CipherError, VaultError};
pub use network::{AccessPoint, HardwareId, HttpClient, HttpResponse, NetworkDriver};
pub use profile::{NetworkProfile, StaticIp};
pub use reset::{ResetPolicy, ResetState, ResetStateMachine};
pub use scheduler::{Clock, LoopControl, Scheduler};
pub use storage::{FileStorage, ProfileStorage};
pub use store::{ApplyResult, CredentialStore};
