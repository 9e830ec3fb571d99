pub mod http_blob;
pub mod http_ocr;
pub mod memory;

pub use http_blob::HttpBlobStore;
pub use http_ocr::HttpOcrGateway;
pub use memory::MemoryRepository;
