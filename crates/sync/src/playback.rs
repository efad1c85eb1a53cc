/// Control surface of the external media player. The coordinator only calls
/// these from the per-tick scheduled checks, never from a packet handler.
pub trait PlaybackControl {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, to_secs: f64);
    fn position_secs(&self) -> f64;
    fn is_playing(&self) -> bool;
}
