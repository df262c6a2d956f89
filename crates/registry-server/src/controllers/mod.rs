mod discovery;
mod download;
mod find_package;
mod versions;

pub use discovery::DiscoveryController;
pub use download::DownloadController;
pub use find_package::FindPackageController;
pub use versions::VersionsController;
