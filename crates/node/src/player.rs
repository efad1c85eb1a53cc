use std::time::Instant;

use wallsync::PlaybackControl;

/// Stand-in for the external media engine: playback position advances with
/// the wall clock while playing. Lets a node run end to end without a real
/// decoder attached.
pub struct SimulatedPlayer {
    playing: bool,
    base_position: f64,
    resumed_at: Option<Instant>,
}

impl Default for SimulatedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self {
            playing: false,
            base_position: 0.0,
            resumed_at: None,
        }
    }
}

impl PlaybackControl for SimulatedPlayer {
    fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            self.resumed_at = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.base_position = self.position_secs();
        self.playing = false;
        self.resumed_at = None;
    }

    fn seek(&mut self, to_secs: f64) {
        self.base_position = to_secs;
        if self.playing {
            self.resumed_at = Some(Instant::now());
        }
    }

    fn position_secs(&self) -> f64 {
        match self.resumed_at {
            Some(resumed_at) if self.playing => {
                self.base_position + resumed_at.elapsed().as_secs_f64()
            }
            _ => self.base_position,
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_position_advances_only_while_playing() {
        let mut player = SimulatedPlayer::new();
        assert_eq!(player.position_secs(), 0.0);

        player.play();
        std::thread::sleep(Duration::from_millis(20));
        assert!(player.position_secs() > 0.0);

        player.pause();
        let paused_at = player.position_secs();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(player.position_secs(), paused_at);
    }

    #[test]
    fn test_seek_rebases_position() {
        let mut player = SimulatedPlayer::new();
        player.seek(42.0);
        assert_eq!(player.position_secs(), 42.0);

        player.play();
        std::thread::sleep(Duration::from_millis(10));
        assert!(player.position_secs() >= 42.0);
    }
}
