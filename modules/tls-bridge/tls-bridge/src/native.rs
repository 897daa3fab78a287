//! The engine as a dynamically loaded C library.
//!
//! Every export takes and returns NUL-terminated strings. Returned strings
//! stay owned by the engine until released through `freeMemory`, which
//! callers do via the response id, so this module only copies them.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char};
use std::path::Path;

use libloading::Library;
use tls_bridge_sdk::{GatewayError, TransportGateway};
use tracing::info;

use crate::asset::AssetManager;
use crate::config::AssetConfig;
use crate::error::ClientError;

type StringCall = unsafe extern "C" fn(*const c_char) -> *const c_char;
type FreeCall = unsafe extern "C" fn(*const c_char);
type NullaryCall = unsafe extern "C" fn() -> *const c_char;

/// [`TransportGateway`] backed by the engine shared library.
pub struct DynamicLibraryGateway {
    request: StringCall,
    free_memory: FreeCall,
    destroy_session: StringCall,
    destroy_all: NullaryCall,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl std::fmt::Debug for DynamicLibraryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicLibraryGateway").finish_non_exhaustive()
    }
}

impl DynamicLibraryGateway {
    /// Load the library at `path` and resolve the engine exports.
    ///
    /// # Errors
    /// [`GatewayError::Load`] if the library cannot be opened and
    /// [`GatewayError::SymbolMissing`] if an export is absent.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        // SAFETY: opening runs the library's initializers; the engine's have
        // no preconditions beyond being loaded once per path.
        let library = unsafe { Library::new(path) }.map_err(|e| GatewayError::Load(e.to_string()))?;
        let request = symbol::<StringCall>(&library, "request")?;
        let free_memory = symbol::<FreeCall>(&library, "freeMemory")?;
        let destroy_session = symbol::<StringCall>(&library, "destroySession")?;
        let destroy_all = symbol::<NullaryCall>(&library, "destroyAll")?;
        Ok(Self {
            request,
            free_memory,
            destroy_session,
            destroy_all,
            _library: library,
        })
    }

    /// Install the engine per [`AssetConfig::load`] if needed, then load it.
    ///
    /// # Errors
    /// Configuration, installation and load failures.
    pub async fn bootstrap() -> Result<Self, ClientError> {
        let manager = AssetManager::new(AssetConfig::load()?)?;
        let path = manager.ensure_ready().await?;
        info!(path = %path.display(), "loading tls engine");
        let gateway = tokio::task::spawn_blocking(move || Self::load(&path)).await??;
        Ok(gateway)
    }
}

fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, GatewayError> {
    // SAFETY: each `T` used here matches the C signature the engine exports
    // under `name`.
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|_| GatewayError::SymbolMissing(name))
}

fn to_c_string(bytes: &[u8]) -> Result<CString, GatewayError> {
    CString::new(bytes).map_err(|_| GatewayError::InteriorNul)
}

/// Copy an engine-owned string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn copy_result(ptr: *const c_char, call: &'static str) -> Result<Vec<u8>, GatewayError> {
    if ptr.is_null() {
        return Err(GatewayError::NullResponse(call));
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    Ok(unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec())
}

impl TransportGateway for DynamicLibraryGateway {
    fn request(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let arg = to_c_string(payload)?;
        // SAFETY: `arg` outlives the call; the result is engine-owned until
        // freed by id.
        unsafe { copy_result((self.request)(arg.as_ptr()), "request") }
    }

    fn free_memory(&self, response_id: &str) -> Result<(), GatewayError> {
        let arg = to_c_string(response_id.as_bytes())?;
        // SAFETY: `arg` outlives the call.
        unsafe { (self.free_memory)(arg.as_ptr()) };
        Ok(())
    }

    fn destroy_session(&self, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let arg = to_c_string(payload)?;
        // SAFETY: as for `request`.
        unsafe { copy_result((self.destroy_session)(arg.as_ptr()), "destroySession") }
    }

    fn destroy_all(&self) -> Result<Vec<u8>, GatewayError> {
        // SAFETY: takes no arguments; result handled as for `request`.
        unsafe { copy_result((self.destroy_all)(), "destroyAll") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DynamicLibraryGateway::load(&dir.path().join("absent.so")).unwrap_err();
        assert!(matches!(err, GatewayError::Load(_)));
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(to_c_string(b"a\0b"), Err(GatewayError::InteriorNul)));
    }

    #[test]
    fn null_result_is_reported() {
        // SAFETY: null is allowed by the contract.
        let err = unsafe { copy_result(std::ptr::null(), "request") }.unwrap_err();
        assert!(matches!(err, GatewayError::NullResponse("request")));
    }
}
