// Datastore persistence
// Byte codec, cross-process lock and atomic file replacement.

pub mod codec;
pub mod io;
pub mod lock;

pub use codec::{decode, encode, CodecError};
pub use io::{DatastoreFile, DiskSpaceTrait, Fs2DiskSpace, PayloadSinkTrait, SyncedSink};
pub use lock::{DatastoreLock, LockMode};
