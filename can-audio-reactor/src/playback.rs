//! Playback arbitration
//!
//! Keeps at most one running playback session per category. Starting a new
//! warning tears down the previous one of the same category before the new
//! one is requested, so the external pipeline never holds two handles for a
//! category.

use crate::config::SoundConfig;
use crate::types::{Category, Channel, Result};
use crate::volume::{DspSink, VolumeTranslator};
use std::collections::HashMap;
use std::path::Path;

/// External pipeline that streams a sound resource to the audio device
pub trait PlaybackPipeline {
    /// Opaque handle to one running playback
    type Handle;

    /// Begin streaming `resource`
    fn start(&mut self, resource: &Path) -> Result<Self::Handle>;

    /// Stop a running playback and release its resources
    fn stop(&mut self, handle: Self::Handle);

    /// Let a playback run to completion on its own
    fn detach(&mut self, handle: Self::Handle) {
        drop(handle);
    }
}

struct Session<H> {
    handle: H,
    channel: Channel,
}

/// Owns the per-category playback sessions
pub struct PlaybackArbiter<P: PlaybackPipeline> {
    pipeline: P,
    sounds: SoundConfig,
    sessions: HashMap<Category, Session<P::Handle>>,
}

impl<P: PlaybackPipeline> PlaybackArbiter<P> {
    pub fn new(pipeline: P, sounds: SoundConfig) -> Self {
        Self {
            pipeline,
            sounds,
            sessions: HashMap::new(),
        }
    }

    /// Start playing `category` for `channel` at `level`
    ///
    /// Beeps are fire-and-forget: they are not tracked, do not replace each
    /// other and leave the notification path alone. Warnings replace the
    /// running session of their category and mute the notification input(s)
    /// of their channel. A pipeline failure is logged and leaves the
    /// category idle.
    ///
    /// A notification input is unmuted only once no running warning covers
    /// it, so sessions of different categories never undo each other.
    pub fn start<D: DspSink>(
        &mut self,
        category: Category,
        channel: Channel,
        level: i64,
        dsp: &mut VolumeTranslator<D>,
    ) {
        let resource = self.sounds.resource(category, channel, level);

        if category.is_pure_tone() {
            match self.pipeline.start(&resource) {
                Ok(handle) => self.pipeline.detach(handle),
                Err(e) => log::warn!("Couldn't play {} tone {:?}: {}", category, resource, e),
            }
            return;
        }

        if let Some(previous) = self.release(category) {
            self.unmute_uncovered(previous, Some(channel), dsp);
        }
        dsp.set_notify_mute(channel, true);

        log::debug!("Starting {} playback on {} channel: {:?}", category, channel, resource);
        match self.pipeline.start(&resource) {
            Ok(handle) => {
                self.sessions.insert(category, Session { handle, channel });
            }
            Err(e) => {
                log::warn!("Couldn't start {} playback {:?}: {}", category, resource, e);
                self.unmute_uncovered(channel, None, dsp);
            }
        }
    }

    /// Stop the session of `category` and restore the channel's notification
    /// input(s) that no other running warning still covers
    pub fn stop<D: DspSink>(
        &mut self,
        category: Category,
        channel: Channel,
        dsp: &mut VolumeTranslator<D>,
    ) {
        self.release(category);
        self.unmute_uncovered(channel, None, dsp);
    }

    /// Whether a session is running for `category`
    pub fn is_active(&self, category: Category) -> bool {
        self.sessions.contains_key(&category)
    }

    /// Channel of the running session for `category`
    pub fn active_channel(&self, category: Category) -> Option<Channel> {
        self.sessions.get(&category).map(|s| s.channel)
    }

    fn release(&mut self, category: Category) -> Option<Channel> {
        let session = self.sessions.remove(&category)?;
        log::debug!("Stopping {} playback on {} channel", category, session.channel);
        self.pipeline.stop(session.handle);
        Some(session.channel)
    }

    /// Unmute the sides of `channel` that neither a running session nor
    /// `incoming` covers
    fn unmute_uncovered<D: DspSink>(
        &self,
        channel: Channel,
        incoming: Option<Channel>,
        dsp: &mut VolumeTranslator<D>,
    ) {
        let covered = |side: Channel| {
            self.sessions.values().any(|s| covers(s.channel, side))
                || incoming.is_some_and(|c| covers(c, side))
        };
        let left = covers(channel, Channel::Left) && !covered(Channel::Left);
        let right = covers(channel, Channel::Right) && !covered(Channel::Right);

        let released = match (left, right) {
            (true, true) => Channel::Center,
            (true, false) => Channel::Left,
            (false, true) => Channel::Right,
            (false, false) => {
                log::debug!("Notification inputs for {} channel still in use", channel);
                return;
            }
        };
        dsp.set_notify_mute(released, false);
    }
}

/// Whether a warning on `channel` mutes the notification input of `side`
fn covers(channel: Channel, side: Channel) -> bool {
    channel == Channel::Center || channel == side
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputPair;
    use crate::types::ReactorError;
    use crate::volume::{DspBatch, DspCommand};
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start(PathBuf, u32),
        Stop(u32),
        Detach(u32),
    }

    #[derive(Clone, Default)]
    struct FakePipeline {
        calls: Rc<RefCell<Vec<Call>>>,
        next: Rc<RefCell<u32>>,
        unavailable: bool,
    }

    impl PlaybackPipeline for FakePipeline {
        type Handle = u32;

        fn start(&mut self, resource: &Path) -> Result<u32> {
            if self.unavailable {
                return Err(ReactorError::Playback("no audio device".to_string()));
            }
            let mut next = self.next.borrow_mut();
            *next += 1;
            self.calls
                .borrow_mut()
                .push(Call::Start(resource.to_path_buf(), *next));
            Ok(*next)
        }

        fn stop(&mut self, handle: u32) {
            self.calls.borrow_mut().push(Call::Stop(handle));
        }

        fn detach(&mut self, handle: u32) {
            self.calls.borrow_mut().push(Call::Detach(handle));
        }
    }

    #[derive(Clone, Default)]
    struct FakeDsp {
        batches: Rc<RefCell<Vec<DspBatch>>>,
    }

    impl DspSink for FakeDsp {
        fn submit(&mut self, batch: &DspBatch) -> Result<()> {
            self.batches.borrow_mut().push(batch.clone());
            Ok(())
        }
    }

    fn setup(pipeline: FakePipeline) -> (PlaybackArbiter<FakePipeline>, VolumeTranslator<FakeDsp>, FakeDsp) {
        let dsp = FakeDsp::default();
        let translator = VolumeTranslator::new(dsp.clone(), 30, InputPair::new(1, 2), InputPair::new(3, 4));
        (PlaybackArbiter::new(pipeline, SoundConfig::default()), translator, dsp)
    }

    #[test]
    fn test_new_warning_replaces_old() {
        let pipeline = FakePipeline::default();
        let (mut arbiter, mut dsp, _) = setup(pipeline.clone());

        arbiter.start(Category::Proximity, Channel::Left, 1, &mut dsp);
        arbiter.start(Category::Proximity, Channel::Right, 2, &mut dsp);

        let calls = pipeline.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                Call::Start(PathBuf::from("prox1-LEFT.flac"), 1),
                Call::Stop(1),
                Call::Start(PathBuf::from("prox2-RIGHT.flac"), 2),
            ]
        );
        assert_eq!(arbiter.active_channel(Category::Proximity), Some(Channel::Right));
    }

    #[test]
    fn test_categories_are_independent() {
        let pipeline = FakePipeline::default();
        let (mut arbiter, mut dsp, _) = setup(pipeline.clone());

        arbiter.start(Category::Proximity, Channel::Center, 3, &mut dsp);
        arbiter.start(Category::Traffic, Channel::Left, 0, &mut dsp);

        assert!(arbiter.is_active(Category::Proximity));
        assert!(arbiter.is_active(Category::Traffic));
        assert!(!pipeline.calls.borrow().iter().any(|c| matches!(c, Call::Stop(_))));
    }

    #[test]
    fn test_beep_is_detached_and_skips_muting() {
        let pipeline = FakePipeline::default();
        let (mut arbiter, mut dsp, batches) = setup(pipeline.clone());

        arbiter.start(Category::Beep, Channel::Center, 1, &mut dsp);
        arbiter.start(Category::Beep, Channel::Center, 1, &mut dsp);

        assert!(!arbiter.is_active(Category::Beep));
        assert_eq!(
            *pipeline.calls.borrow(),
            vec![
                Call::Start(PathBuf::from("beep.flac"), 1),
                Call::Detach(1),
                Call::Start(PathBuf::from("beep.flac"), 2),
                Call::Detach(2),
            ]
        );
        assert!(batches.batches.borrow().is_empty());
    }

    #[test]
    fn test_start_mutes_and_stop_restores_channel() {
        let pipeline = FakePipeline::default();
        let (mut arbiter, mut dsp, batches) = setup(pipeline.clone());

        arbiter.start(Category::Traffic, Channel::Left, 0, &mut dsp);
        arbiter.stop(Category::Traffic, Channel::Center, &mut dsp);

        let batches = batches.batches.borrow();
        assert_eq!(
            batches[0].commands(),
            &[DspCommand::SetInputMute { input: 3, muted: true }]
        );
        assert_eq!(
            batches[1].commands(),
            &[
                DspCommand::SetInputMute { input: 3, muted: false },
                DspCommand::SetInputMute { input: 4, muted: false },
            ]
        );
        assert!(!arbiter.is_active(Category::Traffic));
        assert_eq!(pipeline.calls.borrow().last(), Some(&Call::Stop(1)));
    }

    #[test]
    fn test_failed_start_leaves_category_idle() {
        let pipeline = FakePipeline {
            unavailable: true,
            ..FakePipeline::default()
        };
        let (mut arbiter, mut dsp, _) = setup(pipeline);

        arbiter.start(Category::Proximity, Channel::Left, 2, &mut dsp);
        assert!(!arbiter.is_active(Category::Proximity));

        arbiter.start(Category::Proximity, Channel::Left, 3, &mut dsp);
        assert!(!arbiter.is_active(Category::Proximity));
    }

    fn mutes(dsp: &FakeDsp) -> Vec<(u8, bool)> {
        dsp.batches
            .borrow()
            .iter()
            .flat_map(|b| b.commands().to_vec())
            .filter_map(|c| match c {
                DspCommand::SetInputMute { input, muted } => Some((input, muted)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stop_keeps_inputs_held_by_other_category() {
        let (mut arbiter, mut dsp, batches) = setup(FakePipeline::default());

        arbiter.start(Category::Traffic, Channel::Left, 1, &mut dsp);
        arbiter.start(Category::Proximity, Channel::Center, 2, &mut dsp);
        arbiter.stop(Category::Proximity, Channel::Center, &mut dsp);

        // Only the right input is released; traffic still holds the left one
        assert_eq!(mutes(&batches).last(), Some(&(4, false)));
        assert!(!mutes(&batches).contains(&(3, false)));
        assert!(arbiter.is_active(Category::Traffic));
    }

    #[test]
    fn test_failed_start_keeps_inputs_held_by_other_category() {
        let pipeline = FakePipeline::default();
        let (mut arbiter, mut dsp, batches) = setup(pipeline);
        arbiter.start(Category::Traffic, Channel::Left, 1, &mut dsp);

        arbiter.pipeline.unavailable = true;
        arbiter.start(Category::Proximity, Channel::Left, 2, &mut dsp);

        assert!(!arbiter.is_active(Category::Proximity));
        assert_eq!(mutes(&batches), vec![(3, true), (3, true)]);
    }

    #[test]
    fn test_replacement_releases_previous_side() {
        let (mut arbiter, mut dsp, batches) = setup(FakePipeline::default());

        arbiter.start(Category::Proximity, Channel::Left, 1, &mut dsp);
        arbiter.start(Category::Proximity, Channel::Right, 2, &mut dsp);

        assert_eq!(mutes(&batches), vec![(3, true), (3, false), (4, true)]);
    }

    #[test]
    fn test_replacement_into_center_does_not_flap() {
        let (mut arbiter, mut dsp, batches) = setup(FakePipeline::default());

        arbiter.start(Category::Proximity, Channel::Left, 1, &mut dsp);
        arbiter.start(Category::Proximity, Channel::Center, 2, &mut dsp);

        assert!(!mutes(&batches).contains(&(3, false)));
    }
}
