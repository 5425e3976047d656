pub mod handle;
pub mod lock;
pub mod manager;
pub mod supervisor;

pub use handle::ProcessHandle;
pub use lock::ServiceLock;
pub use manager::{ProcessManager, StopDisposition};
pub use supervisor::{ProcessSupervisor, UnixSupervisor};
