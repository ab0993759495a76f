//! HLE services for oxidized-artic
//!
//! One module per service, registered by port name with the service
//! manager. The loader only touches the registration/redirection surface
//! of each service.

pub mod am;
pub mod apt;
pub mod archive;
pub mod cfg;
pub mod fs_user;
pub mod hid;
pub mod service;

pub use am::Am;
pub use apt::{Apt, DeliverArg};
pub use archive::ArchiveManager;
pub use cfg::{default_country_for_region, is_valid_region_country, mac_to_string, Cfg};
pub use fs_user::{FsUser, ProductInfo, ProgramInfo, PRODUCT_INFO_SIZE};
pub use hid::Hid;
pub use service::ServiceManager;
