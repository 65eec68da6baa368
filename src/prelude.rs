pub use crate::credentials::Credentials;
pub use crate::error::SpacesError;
pub use crate::region::Region;
pub use crate::spaces::{Spaces, SpacesOptions};
pub use crate::types::{Bucket, StorageObject};
