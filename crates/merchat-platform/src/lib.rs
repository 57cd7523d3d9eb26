pub mod client;
pub mod login;
pub mod presence;
pub mod retry;

pub use client::{PlatformClient, RetryPolicy};
pub use login::{Credentials, FixtureLoginProvider, LoginError, LoginProvider, LoginResult, ShopInfo, UserInfo};
pub use presence::set_presence;
