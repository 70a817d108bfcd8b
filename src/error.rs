use thiserror::Error;

/// Errors that can occur during NVS operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. Recovered corruption is never reported, only typed decoding
/// surfaces `Corrupt`.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The partition offset has to be aligned to the page size
    #[error("invalid partition offset")]
    InvalidPartitionOffset,

    /// The partition size has to be a non-zero multiple of the page size
    #[error("invalid partition size")]
    InvalidPartitionSize,

    /// The page size has to be a multiple of the erase size of the flash and fit into a u16
    #[error("invalid page size")]
    InvalidPageSize,

    /// Reserved key, an empty buffer or a payload exceeding `Nvs::max_payload_len()`
    #[error("invalid argument")]
    InvalidArgument,

    /// `Nvs::init()` has not been called yet
    #[error("not initialized")]
    NotInitialized,

    /// The internal error value is returned from the provided `&mut impl NorFlash`
    #[error("flash i/o failure")]
    IoFailure,

    /// No erased page is left and nothing can be reclaimed. Deleting items frees space again.
    #[error("out of space")]
    OutOfSpace,

    /// A stored record does not decode into the requested type
    #[error("corrupted data")]
    Corrupt,
}
