//! AnimationEvaluator: main clock, playback state machine and query API.
//!
//! Methods:
//! - play / play_with, pause, resume, stop, release_animation
//! - advance (clock → sample → resolve → nested instances → commit)
//! - set_frame_no, refresh (re-evaluate without advancing)
//! - queries: states, part_state, labels, user data, part lookup
//! - host overrides: alpha, tint, rotation offset, content scale, part visibility

use log::{debug, trace, warn};

use crate::cells::CellTable;
use crate::clock::LoopPolicy;
use crate::config::{EvalConfig, PlayOptions};
use crate::data::{AnimRef, ProjectData};
use crate::error::{EvalError, ResourceKind};
use crate::event::EvalEvent;
use crate::flags::LoopFlags;
use crate::hierarchy::ParentContext;
use crate::playback::PlaybackState;
use crate::runtime::{validate, AnimRuntime, EvalScope};
use crate::state::PartState;
use crate::Result;

fn unbound() -> EvalError {
    EvalError::resource(ResourceKind::Animation, "<none>")
}

/// User data and labels keyed on `frame`, in authoring order.
fn push_frame_events(anim: AnimRef<'_>, frame: i32, events: &mut Vec<EvalEvent>) {
    for key in anim.animation.user_data.iter().filter(|u| u.frame == frame) {
        let part = usize::try_from(key.part_index)
            .ok()
            .and_then(|i| anim.parts().get(i))
            .map(|p| p.name.clone());
        events.push(EvalEvent::UserData {
            part,
            frame,
            data: key.data.clone(),
        });
    }
    for label in anim.animation.labels.iter().filter(|l| l.frame == frame) {
        events.push(EvalEvent::LabelReached {
            label: label.name.clone(),
            frame,
        });
    }
}

/// Plays one animation of a project and produces per-part draw state.
#[derive(Debug)]
pub struct AnimationEvaluator<'a> {
    project: &'a ProjectData,
    cells: CellTable<'a>,
    cfg: EvalConfig,
    state: PlaybackState,
    runtime: Option<AnimRuntime<'a>>,
    policy: LoopPolicy,
    /// Frames since the start of pass `pass_offset`.
    elapsed: f32,
    /// Passes folded out of `elapsed` while looping forever.
    pass_offset: u32,
    /// Frame that was last evaluated.
    frame: f32,
    step: f32,
    loops_completed: u32,
    /// Subtracted from reported loop totals after `clear_loop_count`.
    loop_base: u32,
    /// Fire the current frame's events on the next advance.
    fire_current: bool,
    hidden: Vec<bool>,
    states: Vec<PartState>,
    warnings: Vec<EvalError>,
}

impl<'a> AnimationEvaluator<'a> {
    pub fn new(project: &'a ProjectData) -> Self {
        Self::with_config(project, EvalConfig::default())
    }

    pub fn with_config(project: &'a ProjectData, cfg: EvalConfig) -> Self {
        Self {
            project,
            cells: CellTable::new(project),
            cfg,
            state: PlaybackState::Stopped,
            runtime: None,
            policy: LoopPolicy::default(),
            elapsed: 0.0,
            pass_offset: 0,
            frame: 0.0,
            step: 1.0,
            loops_completed: 0,
            loop_base: 0,
            fire_current: false,
            hidden: Vec::new(),
            states: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &EvalConfig {
        &self.cfg
    }

    #[inline]
    pub fn cells(&self) -> &CellTable<'a> {
        &self.cells
    }

    // --- playback control -------------------------------------------------

    /// Bind `animation` (`"pack/anim"` or a bare name) and start playing.
    /// `loop_count` 0 loops forever.
    pub fn play(&mut self, animation: &str, loop_count: u32, start_frame: i32) -> Result<()> {
        self.play_with(animation, PlayOptions::new(loop_count, start_frame))
    }

    /// Like [`play`](Self::play) with direction options. The whole instance
    /// graph is validated before anything changes.
    pub fn play_with(&mut self, animation: &str, opts: PlayOptions) -> Result<()> {
        let anim = self
            .project
            .find_animation(animation)
            .ok_or_else(|| EvalError::resource(ResourceKind::Animation, animation))?;
        validate(self.project, anim)?;
        let runtime = AnimRuntime::new(anim)?;

        let last = anim.animation.last_frame();
        let flags = opts.flags & (LoopFlags::REVERSE | LoopFlags::PINGPONG);
        let policy = LoopPolicy::new(0, last, opts.loop_count, flags);
        let start = opts.start_frame.clamp(0, last);

        self.policy = policy;
        self.elapsed = policy.elapsed_for(0, start);
        self.pass_offset = 0;
        self.frame = start as f32;
        self.loops_completed = 0;
        self.loop_base = 0;
        self.fire_current = true;
        self.hidden = vec![false; anim.parts().len()];
        self.runtime = Some(runtime);
        self.state = PlaybackState::Playing;
        debug!(
            "play '{}' loops={} start={start} flags={flags:?}",
            anim.key(),
            opts.loop_count
        );
        self.refresh()
    }

    pub fn pause(&mut self) -> bool {
        if !self.state.can_pause() {
            return false;
        }
        self.state = PlaybackState::Paused;
        debug!("paused at frame {}", self.frame);
        true
    }

    pub fn resume(&mut self) -> bool {
        if !self.state.can_resume() || self.runtime.is_none() {
            return false;
        }
        self.state = PlaybackState::Playing;
        debug!("resumed at frame {}", self.frame);
        true
    }

    /// Stop advancing. The binding and clock position stay for scrubbing;
    /// nested instance runtimes are dropped.
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.reset_instances();
        }
        if self.state.can_stop() {
            debug!("stopped at frame {}", self.frame);
        }
        self.state = PlaybackState::Stopped;
    }

    /// Drop the animation binding and all output.
    pub fn release_animation(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            debug!("released '{}'", runtime.key());
        }
        self.state = PlaybackState::Stopped;
        self.policy = LoopPolicy::default();
        self.elapsed = 0.0;
        self.pass_offset = 0;
        self.frame = 0.0;
        self.loops_completed = 0;
        self.loop_base = 0;
        self.fire_current = false;
        self.hidden.clear();
        self.states.clear();
        self.warnings.clear();
    }

    fn fail(&mut self, err: EvalError) -> EvalError {
        warn!("evaluation failed ({}): {err}", err.category());
        self.state = PlaybackState::Error;
        err
    }

    /// Advance by `dt` seconds and return the events crossed on the way.
    ///
    /// Does nothing unless playing, or for a `dt` that is not a positive
    /// finite number. On error the evaluator moves to
    /// [`PlaybackState::Error`] and keeps the previous output.
    pub fn advance(&mut self, dt: f32) -> Result<Vec<EvalEvent>> {
        if !self.state.is_playing() || !dt.is_finite() || dt <= 0.0 {
            return Ok(Vec::new());
        }
        let Some(runtime) = self.runtime.as_mut() else {
            return Ok(Vec::new());
        };
        let anim = runtime.anim();
        let key = runtime.key().to_string();

        let delta = if self.cfg.frame_skip {
            dt * anim.animation.fps as f32 * self.step
        } else {
            self.step
        };
        let prev = self.elapsed;
        let next = prev + delta;
        let offset = self.pass_offset;

        let max_events = self.cfg.max_events_per_tick;
        let mut events = Vec::new();
        let mut loops = self.loops_completed;
        let mut finished = false;
        let mut truncated = false;

        // Whole frames crossed by this tick, in playback order.
        let first = (if self.fire_current {
            prev.floor()
        } else {
            prev.floor() + 1.0
        }) as i64;
        let last = next.floor() as i64;
        for tick in first..=last {
            if events.len() >= max_events {
                truncated = true;
                break;
            }
            let pos = self.policy.locate(tick as f32);
            let total = offset.saturating_add(pos.pass);
            for n in loops + 1..=total {
                events.push(EvalEvent::LoopCompleted {
                    animation: key.clone(),
                    loops: n - self.loop_base,
                });
            }
            loops = loops.max(total);
            if pos.finished {
                finished = true;
                break;
            }
            push_frame_events(anim, pos.frame, &mut events);
        }

        let pos = self.policy.locate(next);
        if truncated {
            // Skipped crossings still count towards loops and the end.
            loops = loops.max(offset.saturating_add(pos.pass));
            finished = pos.finished;
        }

        let frame = if finished { pos.frame as f32 } else { pos.exact };
        let root = ParentContext::root(&self.cfg);
        let mut scope = EvalScope::new(self.project, &self.cells, &self.cfg, true);
        let result = runtime.evaluate(frame, delta, &root, &self.hidden, &mut scope);
        let EvalScope {
            events: nested,
            warnings,
            ..
        } = scope;
        let states = match result {
            Ok(states) => states,
            Err(err) => return Err(self.fail(err)),
        };

        events.extend(nested);
        if events.len() > max_events {
            events.truncate(max_events);
            truncated = true;
        }
        if truncated {
            warn!("'{key}': more than {max_events} events in one tick; the rest were dropped");
        }
        if finished {
            events.push(EvalEvent::PlaybackEnded {
                animation: key.clone(),
                frame: pos.frame,
            });
        }

        let (elapsed, folded) = self.policy.fold(next);
        self.states = states;
        self.warnings = warnings;
        self.elapsed = elapsed;
        self.pass_offset = offset.saturating_add(folded);
        self.frame = frame;
        self.loops_completed = loops;
        self.fire_current = false;
        trace!("'{key}' elapsed {prev:.3} -> {next:.3}, frame {frame}");
        if finished {
            self.state = PlaybackState::Ended;
            debug!("'{key}' ended at frame {}", pos.frame);
        }
        Ok(events)
    }

    /// Re-evaluate the current frame without advancing any clock.
    pub fn refresh(&mut self) -> Result<()> {
        let Some(runtime) = self.runtime.as_mut() else {
            return Ok(());
        };
        let root = ParentContext::root(&self.cfg);
        let mut scope = EvalScope::new(self.project, &self.cells, &self.cfg, false);
        let result = runtime.evaluate(self.frame, 0.0, &root, &self.hidden, &mut scope);
        let EvalScope { warnings, .. } = scope;
        match result {
            Ok(states) => {
                self.states = states;
                self.warnings = warnings;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Jump to `frame` within the current pass and re-evaluate.
    ///
    /// While playing an out-of-range frame is rejected; otherwise it clamps.
    pub fn set_frame_no(&mut self, frame: i32) -> Result<()> {
        let runtime = self.runtime.as_ref().ok_or_else(unbound)?;
        let last = runtime.anim().animation.last_frame();
        if !(0..=last).contains(&frame) && self.state.is_playing() {
            return Err(EvalError::Range { frame, last });
        }
        let target = frame.clamp(0, last);
        let here = self.policy.locate(self.elapsed);
        let pass = if here.finished {
            here.pass.saturating_sub(1)
        } else {
            here.pass
        };
        self.elapsed = self.policy.elapsed_for(pass, target);
        self.frame = target as f32;
        self.fire_current = true;
        self.refresh()
    }

    // --- queries ----------------------------------------------------------

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Output of the last successful evaluation, indexed by part.
    #[inline]
    pub fn states(&self) -> &[PartState] {
        &self.states
    }

    /// Recoverable errors recorded by the last evaluation.
    #[inline]
    pub fn last_warnings(&self) -> &[EvalError] {
        &self.warnings
    }

    fn anim(&self) -> Option<AnimRef<'a>> {
        self.runtime.as_ref().map(|r| r.anim())
    }

    /// Total frames of the bound animation.
    pub fn max_frame(&self) -> i32 {
        self.anim().map_or(0, |a| a.animation.frame_count as i32)
    }

    /// Whole frame currently shown.
    #[inline]
    pub fn frame_no(&self) -> i32 {
        self.frame.floor() as i32
    }

    /// Real-valued frame currently shown.
    #[inline]
    pub fn frame_position(&self) -> f32 {
        self.frame
    }

    pub fn fps(&self) -> u32 {
        self.anim().map_or(0, |a| a.animation.fps)
    }

    pub fn pack_name(&self) -> Option<&'a str> {
        self.anim().map(|a| a.pack.name.as_str())
    }

    pub fn animation_name(&self) -> Option<&'a str> {
        self.anim().map(|a| a.animation.name.as_str())
    }

    pub fn part_count(&self) -> usize {
        self.anim().map_or(0, |a| a.parts().len())
    }

    pub fn part_name(&self, index: usize) -> Option<&'a str> {
        self.anim()
            .and_then(|a| a.parts().get(index))
            .map(|p| p.name.as_str())
    }

    pub fn index_of_part(&self, name: &str) -> Option<usize> {
        self.anim()
            .and_then(|a| a.parts().iter().position(|p| p.name == name))
    }

    /// Frame of a label. `_start` and `_end` name the first and last frame.
    pub fn label_to_frame(&self, name: &str) -> Option<i32> {
        let anim = self.anim()?;
        match name {
            "_start" => Some(0),
            "_end" => Some(anim.animation.last_frame()),
            _ => anim
                .animation
                .labels
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.frame),
        }
    }

    /// State of one part, either from the live output or evaluated at `frame`
    /// on a copy of the runtime (clamped; the live clock is untouched).
    pub fn part_state(&self, name: &str, frame: Option<i32>) -> Result<PartState> {
        let runtime = self.runtime.as_ref().ok_or_else(unbound)?;
        let index = self
            .index_of_part(name)
            .ok_or_else(|| EvalError::resource(ResourceKind::Part, name))?;
        let Some(frame) = frame else {
            return self
                .states
                .get(index)
                .cloned()
                .ok_or_else(|| EvalError::resource(ResourceKind::Part, name));
        };
        let frame = frame.clamp(0, runtime.anim().animation.last_frame());
        let mut scratch = runtime.clone();
        let root = ParentContext::root(&self.cfg);
        let mut scope = EvalScope::new(self.project, &self.cells, &self.cfg, false);
        let mut states = scratch.evaluate(frame as f32, 0.0, &root, &self.hidden, &mut scope)?;
        Ok(states.swap_remove(index))
    }

    /// User data and labels keyed on `frame` (clamped), without firing them.
    pub fn user_data_at(&self, frame: i32) -> Vec<EvalEvent> {
        let mut events = Vec::new();
        if let Some(anim) = self.anim() {
            push_frame_events(anim, frame.clamp(0, anim.animation.last_frame()), &mut events);
        }
        events
    }

    // --- speed and loops --------------------------------------------------

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Playback speed multiplier; must be finite and non-negative.
    pub fn set_step(&mut self, step: f32) -> Result<()> {
        if !step.is_finite() || step < 0.0 {
            return Err(EvalError::configuration(
                self.anim().map(|a| a.key()).unwrap_or_default(),
                format!("step {step} must be finite and non-negative"),
            ));
        }
        self.step = step;
        Ok(())
    }

    /// Passes before playback ends; 0 loops forever.
    #[inline]
    pub fn loop_count(&self) -> u32 {
        self.policy.limit
    }

    pub fn set_loop_count(&mut self, loop_count: u32) {
        self.policy.limit = loop_count;
        if self.policy.is_limited() && self.pass_offset > 0 {
            // Limits count from pass 0.
            self.elapsed += self.pass_offset as f32 * self.policy.len() as f32;
            self.pass_offset = 0;
        }
    }

    #[inline]
    pub fn loops_completed(&self) -> u32 {
        self.loops_completed - self.loop_base
    }

    pub fn clear_loop_count(&mut self) {
        self.loop_base = self.loops_completed;
    }

    // --- host overrides ---------------------------------------------------
    // These take effect on the next evaluation; call `refresh` to apply them
    // while paused or stopped.

    pub fn set_frame_skip(&mut self, enabled: bool) {
        self.cfg.frame_skip = enabled;
    }

    pub fn set_sub_frame(&mut self, enabled: bool) {
        self.cfg.sub_frame = enabled;
    }

    pub fn set_content_scale(&mut self, scale: f32) {
        self.cfg.content_scale = scale;
    }

    pub fn set_alpha(&mut self, alpha: u8) {
        self.cfg.alpha = alpha;
    }

    pub fn set_color(&mut self, tint: [u8; 3]) {
        self.cfg.tint = tint;
    }

    pub fn set_rotation_offset(&mut self, degrees: [f32; 3]) {
        self.cfg.rotation_offset = degrees;
    }

    /// Hide or show a part (and everything parented under it).
    pub fn set_part_visible(&mut self, name: &str, visible: bool) -> Result<()> {
        let index = self
            .index_of_part(name)
            .ok_or_else(|| EvalError::resource(ResourceKind::Part, name))?;
        self.hidden[index] = !visible;
        Ok(())
    }

    /// Point an instance part of the bound animation at another animation.
    pub fn change_instance_animation(&mut self, part: &str, animation: &str) -> Result<()> {
        let index = self
            .index_of_part(part)
            .ok_or_else(|| EvalError::resource(ResourceKind::Part, part))?;
        let runtime = self.runtime.as_mut().ok_or_else(unbound)?;
        runtime.retarget(self.project, index, animation)
    }
}
