pub mod counting;
pub mod export;
pub mod notify;
pub mod observability;
pub mod production;

pub use counting::{Clock, ManualClock, SystemClock, UniqueCounter, WindowExport, WindowKey};
pub use export::{Exporter, MessageBus};
pub use notify::{Notifier, NotifierConfig};
pub use production::{AcceptServer, RolloverManager, ServiceConfig};
