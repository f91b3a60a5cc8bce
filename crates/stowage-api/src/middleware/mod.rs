pub mod pre_upload;
pub mod request_id;
pub mod upload;

pub use pre_upload::pre_upload_validate;
pub use request_id::{request_id_middleware, RequestId};
pub use upload::upload_files;
