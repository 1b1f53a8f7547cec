// 数据库实体
mod link;
mod social_link;
mod theme;
mod user;

pub use link::*;
pub use social_link::*;
pub use theme::*;
pub use user::*;
