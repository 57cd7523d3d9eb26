pub mod ai_reply;
pub mod business_hours;
pub mod transfer;

pub use ai_reply::AIReplyHandler;
pub use business_hours::BusinessHoursHandler;
pub use transfer::TransferToHumanHandler;
