//! Voice allocation.
//!
//! The [`VoiceAllocator`] trait is what modules see of note dispatch: the
//! active voice count, per-voice notes and the deactivate call made by the
//! amplitude envelope when a release completes. [`VoicePool`] is the
//! allocator the engine uses.

use crate::component::MAX_VOICES;

/// Voice state as seen by the DSP modules.
pub trait VoiceAllocator {
    /// Voices the modules iterate (`0..num_active()`).
    fn num_active(&self) -> usize;

    /// Note held by `voice`, NaN when the voice is idle.
    fn note(&self, voice: usize) -> f32;

    /// True while the voice produces sound (including its release).
    fn is_sounding(&self, voice: usize) -> bool;

    /// True once the voice's note has been released.
    fn is_released(&self, voice: usize) -> bool;

    /// Return the voice to the free pool.
    fn deactivate(&mut self, voice: usize);
}

/// Fixed-capacity voice pool.
///
/// Allocation takes the first free voice; when every voice below the active
/// count is sounding, the oldest note is stolen.
///
/// # Example
///
/// ```rust
/// use polyvox_synth::{VoiceAllocator, VoicePool};
///
/// let mut pool = VoicePool::new(2);
/// let a = pool.note_on(60.0, 1.0);
/// let b = pool.note_on(64.0, 1.0);
/// let c = pool.note_on(67.0, 1.0);
/// assert_ne!(a, b);
/// assert_eq!(c, a, "oldest voice is stolen");
/// assert_eq!(pool.note(a), 67.0);
/// ```
#[derive(Debug, Clone)]
pub struct VoicePool {
    num_voices: usize,
    notes: [f32; MAX_VOICES],
    velocities: [f32; MAX_VOICES],
    sounding: [bool; MAX_VOICES],
    released: [bool; MAX_VOICES],
    ages: [u64; MAX_VOICES],
    age_counter: u64,
}

impl VoicePool {
    /// Create with `num_voices` active slots.
    pub fn new(num_voices: usize) -> Self {
        Self {
            num_voices: num_voices.clamp(1, MAX_VOICES),
            notes: [f32::NAN; MAX_VOICES],
            velocities: [0.0; MAX_VOICES],
            sounding: [false; MAX_VOICES],
            released: [false; MAX_VOICES],
            ages: [0; MAX_VOICES],
            age_counter: 0,
        }
    }

    /// Change the active voice count. Voices above the new count are
    /// silenced; nothing is reallocated.
    pub fn set_num_voices(&mut self, num_voices: usize) {
        let num_voices = num_voices.clamp(1, MAX_VOICES);
        for voice in num_voices..self.num_voices {
            self.deactivate(voice);
        }
        self.num_voices = num_voices;
    }

    /// Start a note and return its voice.
    pub fn note_on(&mut self, note: f32, velocity: f32) -> usize {
        let voice = self.allocate_voice();
        self.age_counter += 1;
        self.ages[voice] = self.age_counter;
        self.notes[voice] = note;
        self.velocities[voice] = velocity.clamp(0.0, 1.0);
        self.sounding[voice] = true;
        self.released[voice] = false;
        voice
    }

    /// Release the oldest held voice playing `note`.
    pub fn note_off(&mut self, note: f32) -> Option<usize> {
        let voice = (0..self.num_voices)
            .filter(|&v| self.sounding[v] && !self.released[v] && self.notes[v] == note)
            .min_by_key(|&v| self.ages[v])?;
        self.released[voice] = true;
        Some(voice)
    }

    /// Silence every voice immediately.
    pub fn all_notes_off(&mut self) {
        for voice in 0..MAX_VOICES {
            self.deactivate(voice);
        }
    }

    /// Velocity of the last note on `voice`, 0..1.
    pub fn velocity(&self, voice: usize) -> f32 {
        self.velocities.get(voice).copied().unwrap_or(0.0)
    }

    /// Number of sounding voices.
    pub fn sounding_count(&self) -> usize {
        self.sounding[..self.num_voices].iter().filter(|s| **s).count()
    }

    fn allocate_voice(&self) -> usize {
        if let Some(free) = (0..self.num_voices).find(|&v| !self.sounding[v]) {
            return free;
        }
        (0..self.num_voices).min_by_key(|&v| self.ages[v]).unwrap_or(0)
    }
}

impl VoiceAllocator for VoicePool {
    fn num_active(&self) -> usize {
        self.num_voices
    }

    fn note(&self, voice: usize) -> f32 {
        self.notes.get(voice).copied().unwrap_or(f32::NAN)
    }

    fn is_sounding(&self, voice: usize) -> bool {
        self.sounding.get(voice).copied().unwrap_or(false)
    }

    fn is_released(&self, voice: usize) -> bool {
        self.released.get(voice).copied().unwrap_or(false)
    }

    fn deactivate(&mut self, voice: usize) {
        if voice < MAX_VOICES {
            self.sounding[voice] = false;
            self.released[voice] = false;
            self.notes[voice] = f32::NAN;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_voice_first() {
        let mut pool = VoicePool::new(4);
        let a = pool.note_on(60.0, 0.5);
        pool.deactivate(a);
        let b = pool.note_on(62.0, 0.5);
        assert_eq!(a, b);
        assert_eq!(pool.sounding_count(), 1);
    }

    #[test]
    fn test_idle_note_is_nan() {
        let pool = VoicePool::new(4);
        assert!(pool.note(0).is_nan());
        assert!(pool.note(99).is_nan());
    }

    #[test]
    fn test_note_off_keeps_sounding() {
        let mut pool = VoicePool::new(4);
        let v = pool.note_on(60.0, 1.0);
        assert_eq!(pool.note_off(60.0), Some(v));
        assert!(pool.is_sounding(v));
        assert!(pool.is_released(v));
        assert_eq!(pool.note_off(60.0), None, "already released");
    }

    #[test]
    fn test_steals_oldest() {
        let mut pool = VoicePool::new(3);
        let first = pool.note_on(60.0, 1.0);
        pool.note_on(61.0, 1.0);
        pool.note_on(62.0, 1.0);
        let stolen = pool.note_on(63.0, 1.0);
        assert_eq!(stolen, first);
        let next = pool.note_on(64.0, 1.0);
        assert_ne!(next, first, "the restarted voice is now the newest");
    }

    #[test]
    fn test_shrinking_silences_upper_voices() {
        let mut pool = VoicePool::new(4);
        for n in 0..4 {
            pool.note_on(60.0 + n as f32, 1.0);
        }
        pool.set_num_voices(2);
        assert_eq!(pool.num_active(), 2);
        assert!(!pool.is_sounding(3));
        pool.set_num_voices(MAX_VOICES + 5);
        assert_eq!(pool.num_active(), MAX_VOICES);
    }
}
