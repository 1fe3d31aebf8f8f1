pub mod follow;
pub mod posts;

pub use follow::FollowService;
pub use posts::PostService;
