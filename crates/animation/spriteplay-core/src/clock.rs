//! Loop mapping and instance sub-clocks.
//!
//! Time math:
//! - elapsed is a non-negative frame count since the clock was armed
//! - pass length `L = end - start + 1`, pass `p = floor(elapsed / L)`
//! - a pass runs backwards when REVERSE is set, toggled on odd passes under PINGPONG
//! - a limited clock holds the final frame of pass `limit - 1` once `p >= limit`

use std::ops::RangeInclusive;

use crate::data::{Animation, InstanceKey};
use crate::error::EvalError;
use crate::flags::LoopFlags;

/// Where a clock currently points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockPosition {
    /// Whole frame to show.
    pub frame: i32,
    /// Fractional frame, for sub-frame sampling.
    pub exact: f32,
    /// Completed passes (capped at the limit once finished).
    pub pass: u32,
    pub finished: bool,
}

/// Frame window plus loop behaviour; shared by the main clock and instance clocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopPolicy {
    pub start: i32,
    pub end: i32,
    /// Passes before the clock holds; 0 = unlimited.
    pub limit: u32,
    pub flags: LoopFlags,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::new(0, 0, 0, LoopFlags::empty())
    }
}

impl LoopPolicy {
    pub fn new(start: i32, end: i32, limit: u32, flags: LoopFlags) -> Self {
        Self {
            start,
            end,
            limit,
            flags,
        }
    }

    /// Frames per pass.
    #[inline]
    pub fn len(&self) -> i32 {
        (self.end - self.start + 1).max(1)
    }

    #[inline]
    pub fn is_limited(&self) -> bool {
        self.limit > 0 && !self.flags.contains(LoopFlags::INFINITY)
    }

    #[inline]
    pub fn runs_backwards(&self, pass: u32) -> bool {
        let reverse = self.flags.contains(LoopFlags::REVERSE);
        let mirrored = self.flags.contains(LoopFlags::PINGPONG) && pass % 2 == 1;
        reverse != mirrored
    }

    fn frame_in_pass(&self, pass: u32, offset: f32) -> f32 {
        let f = if self.runs_backwards(pass) {
            self.end as f32 - offset
        } else {
            self.start as f32 + offset
        };
        f.clamp(self.start as f32, self.end as f32)
    }

    /// Elapsed value that shows `frame` during `pass`.
    pub fn elapsed_for(&self, pass: u32, frame: i32) -> f32 {
        let frame = frame.clamp(self.start, self.end);
        let offset = if self.runs_backwards(pass) {
            self.end - frame
        } else {
            frame - self.start
        };
        pass as f32 * self.len() as f32 + offset as f32
    }

    /// Frames after which an unlimited clock repeats exactly.
    #[inline]
    pub fn cycle_len(&self) -> i32 {
        if self.flags.contains(LoopFlags::PINGPONG) {
            self.len() * 2
        } else {
            self.len()
        }
    }

    /// Reduce an unlimited clock's elapsed value into its first cycle.
    ///
    /// Returns the reduced value and the number of passes removed. Limited
    /// clocks are returned unchanged.
    pub fn fold(&self, elapsed: f32) -> (f32, u32) {
        if self.is_limited() || !elapsed.is_finite() || elapsed < 0.0 {
            return (elapsed, 0);
        }
        let cycle = self.cycle_len() as f32;
        let cycles = (elapsed / cycle).floor();
        if cycles < 1.0 {
            return (elapsed, 0);
        }
        let rest = elapsed - cycles * cycle;
        let rest = if (0.0..cycle).contains(&rest) { rest } else { 0.0 };
        let passes_per_cycle = (self.cycle_len() / self.len()) as f32;
        let passes = (cycles * passes_per_cycle).min(u32::MAX as f32) as u32;
        (rest, passes)
    }

    /// Map elapsed frames to a position.
    pub fn locate(&self, elapsed: f32) -> ClockPosition {
        let len = self.len() as f32;
        let e = if elapsed.is_finite() { elapsed.max(0.0) } else { 0.0 };
        let pass = (e / len).floor();

        if self.is_limited() && pass >= self.limit as f32 {
            let last = self.limit - 1;
            let exact = self.frame_in_pass(last, len - 1.0);
            return ClockPosition {
                frame: exact as i32,
                exact,
                pass: self.limit,
                finished: true,
            };
        }

        let pass = pass.min(u32::MAX as f32) as u32;
        let offset = (e - pass as f32 * len).clamp(0.0, len - 1.0);
        // Backward passes step whole frames down from `end`, then blend towards the next one.
        let whole = self.frame_in_pass(pass, offset.floor());
        let exact = self.frame_in_pass(pass, offset);
        ClockPosition {
            frame: whole as i32,
            exact,
            pass,
            finished: false,
        }
    }
}

/// Loop boundaries crossed by one clock update.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockCrossings {
    /// Running loop totals reached this update, in order.
    pub completed: RangeInclusive<u32>,
    /// The clock reached its limit during this update.
    pub ended: bool,
}

impl ClockCrossings {
    fn none() -> Self {
        Self {
            completed: 1..=0,
            ended: false,
        }
    }
}

/// Check instance parameters against the referenced animation.
pub fn validate_instance_key(
    owner: &str,
    target: &Animation,
    key: &InstanceKey,
) -> Result<(), EvalError> {
    if !key.speed.is_finite() || key.speed < 0.0 {
        return Err(EvalError::configuration(
            owner,
            format!("instance speed {} must be finite and non-negative", key.speed),
        ));
    }
    if target.fps == 0 {
        return Err(EvalError::configuration(
            owner,
            format!("instanced animation '{}' has zero fps", target.name),
        ));
    }
    let (start, end) = window(target, key);
    if start < 0 || start > end {
        return Err(EvalError::configuration(
            owner,
            format!(
                "instance window [{start}, {end}] is empty for '{}'",
                target.name
            ),
        ));
    }
    Ok(())
}

fn window(target: &Animation, key: &InstanceKey) -> (i32, i32) {
    let last = target.last_frame();
    let end = if key.end_frame < 0 {
        last
    } else {
        key.end_frame.min(last)
    };
    (key.start_frame, end)
}

/// Independent playback cursor of one instance part.
#[derive(Clone, Debug)]
pub struct InstanceClock {
    policy: LoopPolicy,
    speed: f32,
    elapsed: f32,
    /// Passes folded out of `elapsed` by independent unlimited clocks.
    folded: u32,
    /// Owner frame of the instance key that armed this clock.
    armed_at: i32,
    current: ClockPosition,
}

impl InstanceClock {
    pub fn new(
        owner: &str,
        target: &Animation,
        key: &InstanceKey,
        armed_at: i32,
    ) -> Result<Self, EvalError> {
        validate_instance_key(owner, target, key)?;
        let (start, end) = window(target, key);
        let policy = LoopPolicy::new(start, end, key.loop_count, key.flags);
        Ok(Self {
            policy,
            speed: key.speed,
            elapsed: 0.0,
            folded: 0,
            armed_at,
            current: policy.locate(0.0),
        })
    }

    #[inline]
    pub fn policy(&self) -> &LoopPolicy {
        &self.policy
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    #[inline]
    pub fn armed_at(&self) -> i32 {
        self.armed_at
    }

    #[inline]
    pub fn position(&self) -> ClockPosition {
        self.current
    }

    /// Move the clock for an owner at `owner_frame` that advanced by `owner_delta`.
    ///
    /// Independent clocks integrate the delta; linked clocks follow the owner's
    /// absolute frame. Moving backwards (owner wrapped or was scrubbed) reports nothing.
    pub fn advance(&mut self, owner_frame: f32, owner_delta: f32) -> ClockCrossings {
        if self.policy.flags.contains(LoopFlags::INDEPENDENT) {
            let integrated = (self.elapsed + owner_delta * self.speed).max(0.0);
            let (elapsed, passes) = self.policy.fold(integrated);
            self.elapsed = elapsed;
            self.folded = self.folded.saturating_add(passes);
        } else {
            self.elapsed = ((owner_frame - self.armed_at as f32) * self.speed).max(0.0);
        }

        let prev = self.current;
        let mut next = self.policy.locate(self.elapsed);
        next.pass = next.pass.saturating_add(self.folded);
        self.current = next;

        if next.pass <= prev.pass {
            return ClockCrossings::none();
        }
        ClockCrossings {
            completed: prev.pass + 1..=next.pass,
            ended: next.finished && !prev.finished,
        }
    }
}
