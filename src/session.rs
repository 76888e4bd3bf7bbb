// ============================================================================
// EDIT SESSION: upload, masks, background edits, undo/redo
// ============================================================================
//
// The session is owned by one thread (the UI loop or the CLI driver). Every job
// gets its own thread for the blocking model call, so an abandoned request
// never holds up new work; decoding, compositing and mask normalization run
// on a private rayon pool. Jobs report back over an mpsc channel and results
// are only ever applied inside `poll()`/`settle()`, so every history push
// happens on the owning thread.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::SessionError;
use crate::history::HistoryStore;
use crate::io::{EncodedImage, ImageHandle, SourceImage, write_png};
use crate::model::{ImageModel, ModelError};
use crate::ops::{compose, mask};
use crate::prompt::{BackgroundOptions, FillMode, PromptHistory, compose_instruction};
use crate::selection::Rect;
use crate::settings::AppSettings;

/// Which of the two image panels edits apply to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActiveEditor {
    #[default]
    Original,
    Edited,
}

impl ActiveEditor {
    pub fn label(self) -> &'static str {
        match self {
            ActiveEditor::Original => "Original",
            ActiveEditor::Edited => "Edited",
        }
    }
}

/// One snapshot in the undo/redo history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorState {
    pub edited_image: Option<ImageHandle>,
    pub original_mask: Option<ImageHandle>,
    pub edited_mask: Option<ImageHandle>,
    pub active_editor: ActiveEditor,
}

impl EditorState {
    pub fn mask(&self, editor: ActiveEditor) -> Option<&ImageHandle> {
        match editor {
            ActiveEditor::Original => self.original_mask.as_ref(),
            ActiveEditor::Edited => self.edited_mask.as_ref(),
        }
    }

    /// Copy of this state with one mask slot replaced.
    pub fn with_mask(&self, editor: ActiveEditor, mask: Option<ImageHandle>) -> Self {
        let mut next = self.clone();
        match editor {
            ActiveEditor::Original => next.original_mask = mask,
            ActiveEditor::Edited => next.edited_mask = mask,
        }
        next
    }

    pub fn active_mask(&self) -> Option<&ImageHandle> {
        self.mask(self.active_editor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    GeneratingMask,
    Processing,
}

/// Shared flag telling an in-flight edit that its result is unwanted.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Threads in the pixel-work pool. Model calls do not use it.
    pub workers: usize,
    pub auto_mask_on_upload: bool,
    /// Initial background picker values. Upload resets the mode only.
    pub background: BackgroundOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            auto_mask_on_upload: true,
            background: BackgroundOptions::default(),
        }
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            auto_mask_on_upload: settings.auto_mask_on_upload,
            background: settings.background_options(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MaskOrigin {
    Automatic,
    Selection,
}

enum MaskInput {
    Subjects { image: ImageHandle, size: (u32, u32) },
    Selection { image: ImageHandle, rect: Rect },
}

type JobResult = Result<Option<EncodedImage>, SessionError>;

enum JobMessage {
    MaskFinished {
        job_id: u64,
        source_id: Uuid,
        target: ActiveEditor,
        origin: MaskOrigin,
        result: JobResult,
    },
    EditFinished {
        job_id: u64,
        source_id: Uuid,
        result: JobResult,
    },
}

struct MaskTicket {
    job_id: u64,
    target: ActiveEditor,
}

struct ActiveEdit {
    job_id: u64,
    token: CancelToken,
}

/// Owns the editor history and drives every edit operation.
pub struct EditSession {
    model: Arc<dyn ImageModel>,
    pool: Arc<rayon::ThreadPool>,
    sender: Sender<JobMessage>,
    receiver: Receiver<JobMessage>,

    history: HistoryStore<EditorState>,
    source: Option<SourceImage>,

    prompt: String,
    prompt_history: PromptHistory,
    background: BackgroundOptions,
    auto_mask_on_upload: bool,

    error: Option<SessionError>,

    mask_jobs: Vec<MaskTicket>,
    active_edit: Option<ActiveEdit>,
    next_job_id: u64,
    /// Jobs spawned whose message has not been received yet, stale ones included.
    outstanding: usize,
}

impl EditSession {
    pub fn new(model: Arc<dyn ImageModel>, options: SessionOptions) -> Result<Self, SessionError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|i| format!("backdrop-pixels-{}", i))
            .build()
            .map_err(|e| SessionError::WorkerPool(e.to_string()))?;
        let (sender, receiver) = mpsc::channel();
        log::info!(
            "[Session] started with model '{}' ({} workers)",
            model.name(),
            options.workers.max(1)
        );
        Ok(Self {
            model,
            pool: Arc::new(pool),
            sender,
            receiver,
            history: HistoryStore::default(),
            source: None,
            prompt: String::new(),
            prompt_history: PromptHistory::new(),
            background: options.background,
            auto_mask_on_upload: options.auto_mask_on_upload,
            error: None,
            mask_jobs: Vec::new(),
            active_edit: None,
            next_job_id: 1,
            outstanding: 0,
        })
    }

    /// Swap the model, e.g. after the API key changed. Jobs already running
    /// keep the model they started with.
    pub fn set_model(&mut self, model: Arc<dyn ImageModel>) {
        log::info!("[Session] model set to '{}'", model.name());
        self.model = model;
    }

    pub fn set_auto_mask_on_upload(&mut self, enabled: bool) {
        self.auto_mask_on_upload = enabled;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn current(&self) -> &EditorState {
        self.history.current()
    }

    pub fn history(&self) -> &HistoryStore<EditorState> {
        &self.history
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn mode(&self) -> SessionMode {
        if self.active_edit.is_some() {
            SessionMode::Processing
        } else if !self.mask_jobs.is_empty() {
            SessionMode::GeneratingMask
        } else {
            SessionMode::Idle
        }
    }

    pub fn is_generating_mask_for(&self, editor: ActiveEditor) -> bool {
        self.mask_jobs.iter().any(|t| t.target == editor)
    }

    pub fn can_apply(&self) -> bool {
        self.source.is_some() && self.active_edit.is_none()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Jobs still running, including ones whose result will be discarded.
    pub fn pending_jobs(&self) -> usize {
        self.outstanding
    }

    // ========================================================================
    // PROMPT & BACKGROUND OPTIONS
    // ========================================================================

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn prompt_mut(&mut self) -> &mut String {
        &mut self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn prompt_history(&self) -> &PromptHistory {
        &self.prompt_history
    }

    /// Copy a recency-list entry into the instruction field.
    pub fn use_recent_prompt(&mut self, index: usize) -> bool {
        match self.prompt_history.get(index) {
            Some(p) => {
                self.prompt = p.to_string();
                true
            }
            None => false,
        }
    }

    pub fn background(&self) -> &BackgroundOptions {
        &self.background
    }

    pub fn background_mut(&mut self) -> &mut BackgroundOptions {
        &mut self.background
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    /// Replace the source image and start over with a blank history.
    pub fn upload_image(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.error = None;
        let name = name.into();
        let source = match SourceImage::decode(name.clone(), bytes) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[Session] could not decode upload '{}': {}", name, e);
                self.error = Some(SessionError::InvalidImage(e.to_string()));
                return;
            }
        };
        log::info!(
            "[Session] uploaded '{}' ({}x{}, {})",
            source.name,
            source.width(),
            source.height(),
            source.encoded.mime_type
        );

        // Work issued against the previous image is now stale
        if let Some(edit) = self.active_edit.take() {
            edit.token.cancel();
        }
        self.mask_jobs.clear();

        self.prompt.clear();
        self.background.mode = FillMode::Transparent;
        self.history.reset(EditorState::default());
        self.source = Some(source);

        if self.auto_mask_on_upload {
            self.auto_generate_mask();
        }
    }

    /// Ask the model for a mask of every salient subject in the uploaded
    /// image. The result lands in the original panel's mask slot.
    pub fn auto_generate_mask(&mut self) {
        self.error = None;
        let Some(source) = self.source.as_ref() else {
            self.error = Some(SessionError::NoActiveImage);
            return;
        };
        let input = MaskInput::Subjects {
            image: source.encoded.clone(),
            size: (source.width(), source.height()),
        };
        self.spawn_mask_job(ActiveEditor::Original, MaskOrigin::Automatic, input);
    }

    /// Segment the object inside `rect` (native pixels of the active panel's
    /// image) and store it in the active panel's mask slot.
    pub fn request_mask_for_selection(&mut self, rect: Rect) {
        self.error = None;
        let (editor, image) = match self.active_input() {
            Ok(v) => v,
            Err(e) => {
                self.error = Some(e);
                return;
            }
        };
        log::info!(
            "[Session] selection on {} panel: {:.0},{:.0} {:.0}x{:.0}",
            editor.label(),
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        self.spawn_mask_job(editor, MaskOrigin::Selection, MaskInput::Selection { image, rect });
    }

    /// Run the background edit on the active panel's image. Does nothing while
    /// another edit is in flight.
    pub fn apply_edit(&mut self) {
        if self.active_edit.is_some() {
            return;
        }
        self.error = None;
        let (editor, image) = match self.active_input() {
            Ok(v) => v,
            Err(e) => {
                self.error = Some(e);
                return;
            }
        };
        let mask = self.current().mask(editor).cloned();
        let instruction = compose_instruction(&self.background.fill(), &self.prompt);
        self.prompt_history.record(&self.prompt);

        let job_id = self.take_job_id();
        let token = CancelToken::new();
        self.active_edit = Some(ActiveEdit {
            job_id,
            token: token.clone(),
        });
        let source_id = self.source_id();
        log::info!(
            "[Session] edit #{} on {} panel ({}, mask: {})",
            job_id,
            editor.label(),
            self.background.mode.label(),
            if mask.is_some() { "yes" } else { "no" }
        );

        let model = Arc::clone(&self.model);
        let spawned = self.spawn_job(
            job_id,
            move |_| JobMessage::EditFinished {
                job_id,
                source_id,
                result: run_edit(model.as_ref(), &image, &instruction, mask.as_ref(), &token),
            },
            move |panic| JobMessage::EditFinished {
                job_id,
                source_id,
                result: Err(ModelError::JobPanicked(panic).into()),
            },
        );
        if let Err(e) = spawned {
            self.active_edit = None;
            self.error = Some(e);
        }
    }

    /// Abandon the in-flight edit. Its result is discarded whenever it arrives.
    pub fn cancel(&mut self) {
        let Some(edit) = self.active_edit.take() else { return };
        edit.token.cancel();
        log::info!("[Session] edit #{} cancelled", edit.job_id);
        self.error = Some(SessionError::Cancelled);
    }

    /// Clear the mask of the active panel. The other panel's mask is kept.
    pub fn clear_mask(&mut self) {
        self.error = None;
        self.history.push_with(|s| s.with_mask(s.active_editor, None));
    }

    /// Switch panels. Refuses `Edited` until an edit has produced an image.
    pub fn activate_editor(&mut self, editor: ActiveEditor) -> bool {
        let current = self.current();
        if current.active_editor == editor {
            return true;
        }
        if editor == ActiveEditor::Edited && current.edited_image.is_none() {
            return false;
        }
        self.error = None;
        self.history.push_with(|s| EditorState {
            active_editor: editor,
            ..s.clone()
        });
        true
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// Write the current edited image to `path` as PNG.
    pub fn export_edited(&self, path: &Path) -> Result<(), SessionError> {
        let image = self
            .current()
            .edited_image
            .as_ref()
            .ok_or(SessionError::NoActiveImage)?;
        write_png(image, path).map_err(|e| SessionError::Export(e.to_string()))?;
        log::info!("[IO] exported edited image to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // JOB RESULTS
    // ========================================================================

    /// Apply every finished job without blocking. Returns whether anything
    /// arrived.
    pub fn poll(&mut self) -> bool {
        let mut any = false;
        loop {
            match self.receiver.try_recv() {
                Ok(msg) => {
                    self.handle(msg);
                    any = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        any
    }

    /// Block until every outstanding job has reported back or `timeout`
    /// elapses. Returns `false` on timeout.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.outstanding > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(msg) => self.handle(msg),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    fn handle(&mut self, msg: JobMessage) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match msg {
            JobMessage::MaskFinished {
                job_id,
                source_id,
                target,
                origin,
                result,
            } => self.finish_mask(job_id, source_id, target, origin, result),
            JobMessage::EditFinished {
                job_id,
                source_id,
                result,
            } => self.finish_edit(job_id, source_id, result),
        }
    }

    fn finish_mask(
        &mut self,
        job_id: u64,
        source_id: Uuid,
        target: ActiveEditor,
        origin: MaskOrigin,
        result: JobResult,
    ) {
        let Some(pos) = self.mask_jobs.iter().position(|t| t.job_id == job_id) else {
            log::debug!("[Session] dropping mask #{} for a replaced image", job_id);
            return;
        };
        self.mask_jobs.remove(pos);
        if source_id != self.source_id() {
            return;
        }

        match result {
            Ok(Some(mask)) => {
                log::info!("[Session] mask #{} stored on {} panel", job_id, target.label());
                let handle = ImageHandle::new(mask);
                self.history.push_with(|s| s.with_mask(target, Some(handle)));
            }
            Ok(None) => {
                log::info!("[Session] mask #{} came back empty", job_id);
                self.error = Some(match origin {
                    MaskOrigin::Automatic => SessionError::NoSubjectDetected,
                    MaskOrigin::Selection => SessionError::NoObjectInSelection,
                });
            }
            Err(e) => {
                log::error!("[AI] mask #{} failed: {}", job_id, e);
                self.error = Some(e);
            }
        }
    }

    fn finish_edit(&mut self, job_id: u64, source_id: Uuid, result: JobResult) {
        let is_current = self.active_edit.as_ref().is_some_and(|e| e.job_id == job_id);
        if !is_current {
            log::debug!("[Session] discarding result of abandoned edit #{}", job_id);
            return;
        }
        let Some(edit) = self.active_edit.take() else { return };
        if edit.token.is_cancelled() || source_id != self.source_id() {
            return;
        }

        match result {
            Ok(Some(image)) => {
                log::info!("[Session] edit #{} finished", job_id);
                let handle = ImageHandle::new(image);
                self.history.push(EditorState {
                    edited_image: Some(handle),
                    original_mask: None,
                    edited_mask: None,
                    active_editor: ActiveEditor::Edited,
                });
            }
            Ok(None) => {
                log::info!("[Session] edit #{} produced no image", job_id);
                self.error = Some(SessionError::EditUnavailable);
            }
            Err(e) => {
                log::error!("[AI] edit #{} failed: {}", job_id, e);
                self.error = Some(e);
            }
        }
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Image and mask slot that operations currently target.
    fn active_input(&self) -> Result<(ActiveEditor, ImageHandle), SessionError> {
        let state = self.current();
        let image = match state.active_editor {
            ActiveEditor::Original => self.source.as_ref().map(|s| s.encoded.clone()),
            ActiveEditor::Edited => state.edited_image.clone(),
        };
        image
            .map(|i| (state.active_editor, i))
            .ok_or(SessionError::NoActiveImage)
    }

    fn source_id(&self) -> Uuid {
        self.source.as_ref().map(|s| s.id).unwrap_or_default()
    }

    fn take_job_id(&mut self) -> u64 {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }

    fn spawn_mask_job(&mut self, target: ActiveEditor, origin: MaskOrigin, input: MaskInput) {
        let job_id = self.take_job_id();
        let source_id = self.source_id();
        self.mask_jobs.push(MaskTicket { job_id, target });
        log::info!(
            "[Session] mask #{} requested ({:?}, {} panel)",
            job_id,
            origin,
            target.label()
        );

        let model = Arc::clone(&self.model);
        let spawned = self.spawn_job(
            job_id,
            move |pool| JobMessage::MaskFinished {
                job_id,
                source_id,
                target,
                origin,
                result: run_mask(model.as_ref(), pool, input),
            },
            move |panic| JobMessage::MaskFinished {
                job_id,
                source_id,
                target,
                origin,
                result: Err(ModelError::JobPanicked(panic).into()),
            },
        );
        if let Err(e) = spawned {
            self.mask_jobs.retain(|t| t.job_id != job_id);
            self.error = Some(e);
        }
    }

    /// Run `work` on a thread of its own. The model call blocks that thread
    /// only; pixel work inside `work` goes through the shared pool.
    fn spawn_job(
        &mut self,
        job_id: u64,
        work: impl FnOnce(&rayon::ThreadPool) -> JobMessage + Send + 'static,
        on_panic: impl FnOnce(String) -> JobMessage + Send + 'static,
    ) -> Result<(), SessionError> {
        let sender = self.sender.clone();
        let pool = Arc::clone(&self.pool);
        let spawned = std::thread::Builder::new()
            .name(format!("backdrop-job-{}", job_id))
            .spawn(move || {
                let msg = match catch_unwind(AssertUnwindSafe(|| work(&pool))) {
                    Ok(msg) => msg,
                    Err(panic_info) => {
                        let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic_info.downcast_ref::<String>() {
                            s.to_string()
                        } else {
                            "unknown panic payload".to_string()
                        };
                        log::error!("[Session] job panicked: {}", msg);
                        on_panic(msg)
                    }
                };
                let _ = sender.send(msg);
            });
        match spawned {
            Ok(_) => {
                self.outstanding += 1;
                Ok(())
            }
            Err(e) => {
                log::error!("[Session] could not start job #{}: {}", job_id, e);
                Err(SessionError::WorkerPool(e.to_string()))
            }
        }
    }
}

// ============================================================================
// JOB BODIES: run on the job's own thread
// ============================================================================

fn run_mask(model: &dyn ImageModel, pool: &rayon::ThreadPool, input: MaskInput) -> JobResult {
    let (raw, size) = match input {
        MaskInput::Subjects { image, size } => (model.segment_subjects(&image)?, size),
        MaskInput::Selection { image, rect } => {
            let (composite, size) = pool.install(|| selection_composite(&image, rect))?;
            (model.segment_selection(&composite)?, size)
        }
    };
    let Some(raw) = raw else { return Ok(None) };
    let normalized = pool.install(|| normalize_model_mask(&raw, size))?;
    Ok(Some(normalized))
}

/// Copy of `image` with `rect` burned in, plus the image's size.
fn selection_composite(
    image: &EncodedImage,
    rect: Rect,
) -> Result<(EncodedImage, (u32, u32)), SessionError> {
    let pixels = image
        .decode_rgba()
        .map_err(|e| SessionError::InvalidImage(e.to_string()))?;
    let size = pixels.dimensions();
    let composite = compose::burn_selection(&pixels, rect);
    let encoded = EncodedImage::png_from_rgba(&composite)
        .map_err(|e| SessionError::InvalidImage(e.to_string()))?;
    Ok((encoded, size))
}

fn normalize_model_mask(raw: &EncodedImage, size: (u32, u32)) -> Result<EncodedImage, SessionError> {
    let decoded = raw
        .decode()
        .map_err(|e| ModelError::UndecodableImage(e.to_string()))?;
    let normalized = mask::normalize_mask(&decoded, size.0, size.1);
    log::debug!(
        "[Session] mask covers {:.1}% of the image",
        mask::coverage(&normalized) * 100.0
    );
    let encoded = EncodedImage::png_from_gray(&normalized)
        .map_err(|e| ModelError::UndecodableImage(e.to_string()))?;
    Ok(encoded)
}

fn run_edit(
    model: &dyn ImageModel,
    image: &ImageHandle,
    instruction: &str,
    mask: Option<&ImageHandle>,
    token: &CancelToken,
) -> JobResult {
    if token.is_cancelled() {
        return Err(SessionError::Cancelled);
    }
    let result = model.edit_image(image, instruction, mask.map(|m| m.image()))?;
    if token.is_cancelled() {
        return Err(SessionError::Cancelled);
    }
    let Some(result) = result else { return Ok(None) };

    let result_size = result
        .dimensions()
        .map_err(|e| ModelError::UndecodableImage(e.to_string()))?;
    if let Ok(input_size) = image.dimensions() {
        if input_size != result_size {
            log::warn!(
                "[AI] edited image is {}x{}, input was {}x{}",
                result_size.0,
                result_size.1,
                input_size.0,
                input_size.1
            );
        }
    }
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_mask_touches_one_slot() {
        let a = ImageHandle::new(EncodedImage::new(vec![1], "image/png"));
        let b = ImageHandle::new(EncodedImage::new(vec![2], "image/png"));
        let state = EditorState {
            original_mask: Some(a.clone()),
            ..EditorState::default()
        };
        let next = state.with_mask(ActiveEditor::Edited, Some(b.clone()));
        assert_eq!(next.original_mask, Some(a));
        assert_eq!(next.edited_mask, Some(b));
        assert_eq!(state.edited_mask, None);
    }

    #[test]
    fn active_mask_follows_editor() {
        let m = ImageHandle::new(EncodedImage::new(vec![3], "image/png"));
        let mut state = EditorState::default().with_mask(ActiveEditor::Edited, Some(m.clone()));
        assert!(state.active_mask().is_none());
        state.active_editor = ActiveEditor::Edited;
        assert_eq!(state.active_mask(), Some(&m));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn options_from_settings_copy_picker_defaults() {
        let mut settings = AppSettings::default();
        settings.auto_mask_on_upload = false;
        let opts = SessionOptions::from_settings(&settings);
        assert!(!opts.auto_mask_on_upload);
        assert_eq!(opts.background.solid, settings.solid_color);
        assert_eq!(opts.background.mode, FillMode::Transparent);
    }
}
