pub mod admin_repo;
pub mod inbound_repo;
pub mod node_repo;
pub mod reminder_repo;
pub mod service_repo;
pub mod system_repo;
pub mod usage_repo;
pub mod user_repo;

pub use admin_repo::AdminRepository;
pub use inbound_repo::InboundRepository;
pub use node_repo::NodeRepository;
pub use reminder_repo::ReminderRepository;
pub use service_repo::ServiceRepository;
pub use system_repo::SystemRepository;
pub use usage_repo::UsageRepository;
pub use user_repo::UserRepository;
