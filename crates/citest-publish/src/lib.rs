pub mod aws;
pub mod dir;
pub mod memory;
pub mod publisher;
pub mod traits;

pub use aws::AwsCliBlobStore;
pub use dir::DirBlobStore;
pub use memory::InMemoryBlobStore;
pub use publisher::*;
pub use traits::*;
