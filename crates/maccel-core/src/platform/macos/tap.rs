// Maccel macOS - Quartz event tap
// Session event tap on a dedicated run-loop thread

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use core_foundation_sys::base::{CFRelease, CFRetain};
use core_foundation_sys::mach_port::{CFMachPortCreateRunLoopSource, CFMachPortInvalidate, CFMachPortRef};
use core_foundation_sys::runloop::{
    kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoopAddSource, CFRunLoopGetCurrent,
    CFRunLoopRef, CFRunLoopRunInMode, CFRunLoopStop,
};
use crossbeam_channel::bounded;
use parking_lot::Mutex;

use super::ffi::{self, CGEventRef, CGEventTapProxy};
use crate::input::{event_type, RawKeyEvent};
use crate::tap::{
    EventMask, InstallError, TapBackend, TapDriver, TapError, TapInput, TapPort, TapVerdict,
};
use crate::KeyCode;

/// Whether this process may observe and modify keyboard input
pub fn has_accessibility_permission() -> bool {
    unsafe { ffi::AXIsProcessTrusted() != 0 }
}

/// Text a key event would type, for diagnostics
pub(crate) unsafe fn unicode_string(event: CGEventRef) -> String {
    let mut buffer = [0u16; 8];
    let mut len: ffi::UniCharCount = 0;
    ffi::CGEventKeyboardGetUnicodeString(
        event,
        buffer.len() as ffi::UniCharCount,
        &mut len,
        buffer.as_mut_ptr(),
    );
    crate::input::decode_key_text(&buffer[..(len as usize).min(buffer.len())])
}

unsafe fn read_event(event_type: u32, event: CGEventRef) -> RawKeyEvent {
    RawKeyEvent {
        event_type,
        key_code: KeyCode::new(
            ffi::CGEventGetIntegerValueField(event, ffi::kCGKeyboardEventKeycode) as u64,
        ),
        flags: ffi::CGEventGetFlags(event),
        autorepeat: ffi::CGEventGetIntegerValueField(event, ffi::kCGKeyboardEventAutorepeat) != 0,
        timestamp: ffi::CGEventGetTimestamp(event),
        user_data: ffi::CGEventGetIntegerValueField(event, ffi::kCGEventSourceUserData),
    }
}

unsafe fn write_event(event: CGEventRef, replacement: &RawKeyEvent) -> bool {
    let Some(code) = replacement.key_code.to_native() else {
        return false;
    };
    ffi::CGEventSetIntegerValueField(event, ffi::kCGKeyboardEventKeycode, i64::from(code));
    ffi::CGEventSetFlags(event, replacement.flags);
    true
}

struct CallbackContext {
    driver: TapDriver,
}

unsafe extern "C" fn tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() || event.is_null() {
        return event;
    }
    let context = &mut *(user_info as *mut CallbackContext);
    let raw = read_event(event_type, event);

    if event_type == event_type::KEY_DOWN && log::log_enabled!(log::Level::Trace) {
        log::trace!("{} types {:?}", raw.key_code, unicode_string(event));
    }

    match context.driver.dispatch(TapInput::from_event(raw)) {
        TapVerdict::PassThrough => event,
        TapVerdict::Suppress => ptr::null_mut(),
        TapVerdict::Replace(replacement) => {
            if !write_event(event, &replacement) {
                log::debug!("Replacement {} not representable", replacement.key_code);
            }
            event
        }
    }
}

struct RawPtr<T>(T);

// Core Foundation objects are reference counted and thread-safe to retain,
// release, enable and stop from any thread.
unsafe impl<T> Send for RawPtr<T> {}
unsafe impl<T> Sync for RawPtr<T> {}

/// Installed Quartz tap
pub struct QuartzTapPort {
    tap: RawPtr<CFMachPortRef>,
    run_loop: RawPtr<CFRunLoopRef>,
    removed: Arc<AtomicBool>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TapPort for QuartzTapPort {
    fn enable(&self) -> bool {
        if self.removed.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            ffi::CGEventTapEnable(self.tap.0, true);
            ffi::CGEventTapIsEnabled(self.tap.0)
        }
    }

    fn is_enabled(&self) -> bool {
        !self.removed.load(Ordering::Acquire) && unsafe { ffi::CGEventTapIsEnabled(self.tap.0) }
    }

    fn remove(&self) {
        if self.removed.swap(true, Ordering::AcqRel) {
            return;
        }
        unsafe {
            ffi::CGEventTapEnable(self.tap.0, false);
            CFRunLoopStop(self.run_loop.0);
        }
        // the tap thread cannot join itself
        if std::thread::current().id() == self.thread_id {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Event tap thread panicked");
            }
        }
    }
}

impl Drop for QuartzTapPort {
    fn drop(&mut self) {
        self.remove();
        unsafe {
            CFRelease(self.tap.0 as *const c_void);
            CFRelease(self.run_loop.0 as *const c_void);
        }
    }
}

type Started = Result<(RawPtr<CFMachPortRef>, RawPtr<CFRunLoopRef>), (TapError, TapDriver)>;

/// Installs session-level keyboard taps through Quartz Event Services
#[derive(Debug, Default)]
pub struct QuartzTapBackend;

impl QuartzTapBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TapBackend for QuartzTapBackend {
    fn install(&mut self, mask: EventMask, driver: TapDriver) -> Result<Arc<dyn TapPort>, InstallError> {
        if !has_accessibility_permission() {
            return Err(InstallError::new(TapError::Permission, driver));
        }

        let (started_tx, started_rx) = bounded::<Started>(1);
        let native_mask = mask.to_native();
        let removed = Arc::new(AtomicBool::new(false));
        let thread_removed = removed.clone();

        let handle = std::thread::Builder::new()
            .name("maccel-tap".to_string())
            .spawn(move || {
                run_tap(native_mask, driver, &thread_removed, |started| {
                    let _ = started_tx.send(started);
                });
            })
            .map_err(|e| {
                InstallError::lost(TapError::Resource(format!("cannot spawn tap thread: {}", e)))
            })?;

        let thread_id = handle.thread().id();
        match started_rx.recv() {
            Ok(Ok((tap, run_loop))) => {
                log::debug!("Quartz event tap running on {:?}", thread_id);
                Ok(Arc::new(QuartzTapPort {
                    tap,
                    run_loop,
                    removed,
                    thread_id,
                    thread: Mutex::new(Some(handle)),
                }))
            }
            Ok(Err((error, driver))) => {
                let _ = handle.join();
                Err(InstallError::new(error, driver))
            }
            Err(_) => {
                let _ = handle.join();
                Err(InstallError::lost(TapError::Resource(
                    "tap thread exited during setup".to_string(),
                )))
            }
        }
    }
}

/// Body of the tap thread: create, report, run until removed, clean up
fn run_tap(mask: u64, driver: TapDriver, removed: &AtomicBool, report: impl FnOnce(Started)) {
    let context = Box::into_raw(Box::new(CallbackContext { driver }));

    unsafe {
        let tap = ffi::CGEventTapCreate(
            ffi::kCGSessionEventTap,
            ffi::kCGHeadInsertEventTap,
            ffi::kCGEventTapOptionDefault,
            mask,
            tap_callback,
            context as *mut c_void,
        );
        if tap.is_null() {
            let context = Box::from_raw(context);
            report(Err((
                TapError::Resource("CGEventTapCreate returned null".to_string()),
                context.driver,
            )));
            return;
        }

        let source = CFMachPortCreateRunLoopSource(ptr::null(), tap, 0);
        if source.is_null() {
            CFMachPortInvalidate(tap);
            CFRelease(tap as *const c_void);
            let context = Box::from_raw(context);
            report(Err((
                TapError::Resource("cannot create run loop source".to_string()),
                context.driver,
            )));
            return;
        }

        let run_loop = CFRunLoopGetCurrent();
        CFRunLoopAddSource(run_loop, source, kCFRunLoopCommonModes);
        ffi::CGEventTapEnable(tap, true);

        // the port handle gets its own references
        CFRetain(tap as *const c_void);
        CFRetain(run_loop as *const c_void);
        report(Ok((RawPtr(tap), RawPtr(run_loop))));

        // a stop that lands before the loop starts is caught on the next pass
        while !removed.load(Ordering::Acquire) {
            CFRunLoopRunInMode(kCFRunLoopDefaultMode, 1.0, 0);
        }

        CFMachPortInvalidate(tap);
        CFRelease(source as *const c_void);
        CFRelease(tap as *const c_void);
        drop(Box::from_raw(context));
    }
    log::debug!("Event tap run loop finished");
}
