// Maccel macOS - Text Input Sources
// Enabled, selectable keyboard layouts in system order

use std::ffi::c_void;

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::CFDictionary;
use core_foundation::string::CFString;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::{CFEqual, CFRelease};

use super::ffi;
use crate::input_source::{check_index, InputSourceError};
use crate::InputSourceSelector;

/// Selector backed by the Text Input Source Services.
///
/// The list is queried on every call so layouts enabled or removed while
/// running are picked up.
#[derive(Debug, Default)]
pub struct TisInputSources;

impl TisInputSources {
    pub fn new() -> Self {
        Self
    }
}

/// Owned `CFArray` of input sources
struct SourceList(CFArrayRef);

impl SourceList {
    fn keyboard_layouts() -> Option<Self> {
        let filter = unsafe {
            CFDictionary::from_CFType_pairs(&[
                (
                    CFString::wrap_under_get_rule(ffi::kTISPropertyInputSourceCategory).as_CFType(),
                    CFString::wrap_under_get_rule(ffi::kTISCategoryKeyboardInputSource).as_CFType(),
                ),
                (
                    CFString::wrap_under_get_rule(ffi::kTISPropertyInputSourceIsSelectCapable)
                        .as_CFType(),
                    CFBoolean::true_value().as_CFType(),
                ),
            ])
        };
        let list = unsafe { ffi::TISCreateInputSourceList(filter.as_concrete_TypeRef(), 0) };
        (!list.is_null()).then_some(SourceList(list))
    }

    fn len(&self) -> usize {
        usize::try_from(unsafe { CFArrayGetCount(self.0) }).unwrap_or(0)
    }

    fn get(&self, index: usize) -> Option<*const c_void> {
        if index >= self.len() {
            return None;
        }
        let item = unsafe { CFArrayGetValueAtIndex(self.0, index as isize) };
        (!item.is_null()).then_some(item)
    }
}

impl Drop for SourceList {
    fn drop(&mut self) {
        unsafe { CFRelease(self.0 as *const c_void) };
    }
}

impl InputSourceSelector for TisInputSources {
    fn count(&self) -> usize {
        SourceList::keyboard_layouts().map_or(0, |list| list.len())
    }

    fn current(&self) -> Option<usize> {
        let list = SourceList::keyboard_layouts()?;
        unsafe {
            let current = ffi::TISCopyCurrentKeyboardInputSource();
            if current.is_null() {
                return None;
            }
            let current_id = ffi::TISGetInputSourceProperty(current, ffi::kTISPropertyInputSourceID);
            let found = (0..list.len()).find(|&i| {
                list.get(i).is_some_and(|source| {
                    let id = ffi::TISGetInputSourceProperty(
                        source as ffi::TISInputSourceRef,
                        ffi::kTISPropertyInputSourceID,
                    );
                    !id.is_null() && !current_id.is_null() && CFEqual(id, current_id) != 0
                })
            });
            CFRelease(current as *const c_void);
            found
        }
    }

    fn try_select(&self, index: usize) -> Result<(), InputSourceError> {
        let list = SourceList::keyboard_layouts();
        let available = list.as_ref().map_or(0, SourceList::len);
        check_index(index, available)?;
        let source = list
            .as_ref()
            .and_then(|l| l.get(index))
            .ok_or(InputSourceError::InvalidIndex { index, available })?;
        let status = unsafe { ffi::TISSelectInputSource(source as ffi::TISInputSourceRef) };
        if status == 0 {
            Ok(())
        } else {
            Err(InputSourceError::Refused(status))
        }
    }
}
