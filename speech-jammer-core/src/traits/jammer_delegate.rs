use crate::models::error::JammerError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::JammerState;

/// Event delegate for controller notifications.
///
/// `on_error` may be called from the processing thread; the other methods
/// are called from whichever thread invoked the controller operation.
/// Implementations should marshal to the UI thread if needed.
pub trait JammerDelegate: Send + Sync {
    /// Called when the controller enters a new state.
    fn on_state_changed(&self, state: &JammerState);

    /// Called on non-fatal loop errors (recording failure) and on device loss.
    fn on_error(&self, error: &JammerError);

    /// Called when a recording file has been finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
