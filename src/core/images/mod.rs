// Images module - resolving picture references and relaying image bytes.

pub mod image_reference;
mod image_relay;

pub use image_reference::ImageReferenceResolver;
pub use image_relay::{
    ImageHost, ImageHostError, ImageQuery, ImageRelayService, RelayError,
    RelayPolicy, RelayedImage, TransportEncoding, UpstreamImage, CACHE_CONTROL,
    DEFAULT_ALLOWED_HOSTS, MAX_IMAGE_BYTES,
};
