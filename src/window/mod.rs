//! Surface presentation state machine
//!
//! [`SurfaceState`] decides what happens to the window's surface in response
//! to each server event. It never touches protocol objects itself: every
//! event is turned into an ordered list of [`SurfaceRequest`]s that the
//! session carries out on the real `wl_surface`/`xdg_surface` and buffer pool.
//!
//! ```text
//! Uninitialized ──Created──► AwaitingFirstConfigure ──SurfaceConfigure──► Presenting
//!                                                                          │   ▲
//!                                                      ToplevelConfigure ──┘   │ (buffers rebuilt,
//!                                                                              │  next frame attaches)
//!                                                      CloseRequested ──► Closed
//! ```
//!
//! Frame pacing is continuous: every `FrameDone` re-arms exactly one new frame
//! callback before anything else, because the callback is one-shot and a
//! missed re-arm stalls presentation for good.

use crate::buffer::{select_next, Size};
use log::{debug, trace, warn};

/// Presentation phase of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePhase {
    Uninitialized,
    AwaitingFirstConfigure,
    Presenting,
    Closed,
}

/// Server-side happenings that concern the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface, its xdg surface and toplevel were created.
    Created,
    /// `xdg_toplevel.configure`: suggested size, 0 meaning "client decides".
    ToplevelConfigure { width: i32, height: i32 },
    /// `xdg_surface.configure`: end of a configure sequence.
    SurfaceConfigure { serial: u32 },
    /// `wl_callback.done` for the pending frame callback.
    FrameDone { time: u32 },
    /// `xdg_toplevel.close`
    CloseRequested,
}

/// What the session must do to the surface, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRequest {
    /// Rebuild every pixel buffer at this size.
    SetupBuffers { width: i32, height: i32 },
    AckConfigure { serial: u32 },
    /// Ask for the next frame callback.
    RequestFrame,
    /// Map buffer `index`, run the pixel fill, unmap.
    Render { index: usize },
    Attach { index: usize },
    /// Damage the whole buffer.
    DamageBuffer { width: i32, height: i32 },
    Commit,
}

/// Frames-per-second estimate from frame callback timestamps.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    window_start: Option<u32>,
    frames: u32,
}

impl FrameCounter {
    /// Counts one frame; returns the rate once a full second has elapsed.
    pub fn tick(&mut self, time_ms: u32) -> Option<f32> {
        let start = *self.window_start.get_or_insert(time_ms);
        self.frames += 1;

        let elapsed = time_ms.wrapping_sub(start);
        if elapsed < 1000 {
            return None;
        }
        let rate = self.frames as f32 * 1000.0 / elapsed as f32;
        self.window_start = Some(time_ms);
        self.frames = 0;
        Some(rate)
    }
}

/// State of the single presentable surface.
#[derive(Debug, Clone)]
pub struct SurfaceState {
    phase: SurfacePhase,
    /// Current buffer size; `None` until the first configure.
    geometry: Option<Size>,
    default_size: Size,
    buffer_count: usize,
    /// Buffer attached to the surface, if any.
    active_buffer: Option<usize>,
    /// Buffer that most recently finished rendering.
    last_rendered_buffer: Option<usize>,
    running: bool,
    animation_speed: i32,
    frame_counter: FrameCounter,
}

impl SurfaceState {
    pub fn new(buffer_count: usize, default_size: Size) -> Self {
        Self {
            phase: SurfacePhase::Uninitialized,
            geometry: None,
            default_size,
            buffer_count,
            active_buffer: None,
            last_rendered_buffer: None,
            running: true,
            animation_speed: 0,
            frame_counter: FrameCounter::default(),
        }
    }

    pub fn handle(&mut self, event: SurfaceEvent) -> Vec<SurfaceRequest> {
        trace!("Surface event {:?} in phase {:?}", event, self.phase);
        match event {
            SurfaceEvent::Created => self.on_created(),
            SurfaceEvent::ToplevelConfigure { width, height } => {
                self.on_toplevel_configure(width, height)
            }
            SurfaceEvent::SurfaceConfigure { serial } => self.on_surface_configure(serial),
            SurfaceEvent::FrameDone { time } => self.on_frame_done(time),
            SurfaceEvent::CloseRequested => {
                debug!("Close requested for the surface");
                self.running = false;
                self.phase = SurfacePhase::Closed;
                Vec::new()
            }
        }
    }

    fn on_created(&mut self) -> Vec<SurfaceRequest> {
        if self.phase != SurfacePhase::Uninitialized {
            warn!("Surface created twice, ignoring");
            return Vec::new();
        }
        self.phase = SurfacePhase::AwaitingFirstConfigure;
        vec![SurfaceRequest::RequestFrame, SurfaceRequest::Commit]
    }

    fn on_toplevel_configure(&mut self, width: i32, height: i32) -> Vec<SurfaceRequest> {
        let suggested = Size::new(width, height);
        let target = match (suggested.is_unset(), self.geometry) {
            (false, _) => suggested,
            (true, None) => self.default_size,
            (true, Some(current)) => current,
        };
        if self.geometry == Some(target) {
            trace!("Toplevel configure keeps {}x{}", target.width, target.height);
            return Vec::new();
        }

        debug!("Resizing surface buffers to {}x{}", target.width, target.height);
        self.geometry = Some(target);
        // Nothing is attached again until the next frame callback.
        self.active_buffer = None;
        self.last_rendered_buffer = None;
        vec![SurfaceRequest::SetupBuffers {
            width: target.width,
            height: target.height,
        }]
    }

    fn on_surface_configure(&mut self, serial: u32) -> Vec<SurfaceRequest> {
        let mut requests = vec![SurfaceRequest::AckConfigure { serial }];
        if self.phase != SurfacePhase::AwaitingFirstConfigure {
            requests.push(SurfaceRequest::Commit);
            return requests;
        }

        if self.geometry.is_none() {
            requests.extend(self.on_toplevel_configure(0, 0));
        }
        requests.push(SurfaceRequest::Attach { index: 0 });
        requests.push(SurfaceRequest::Commit);
        self.active_buffer = Some(0);
        self.phase = SurfacePhase::Presenting;
        requests
    }

    fn on_frame_done(&mut self, time: u32) -> Vec<SurfaceRequest> {
        let mut requests = vec![SurfaceRequest::RequestFrame];

        if let Some(rate) = self.frame_counter.tick(time) {
            debug!("Presenting at {:.1} frames per second", rate);
        }

        let size = self
            .geometry
            .filter(|_| self.phase != SurfacePhase::AwaitingFirstConfigure);
        let Some(size) = size else {
            // Nothing may be attached before the first configure is acked;
            // the commit applies the re-armed callback.
            requests.push(SurfaceRequest::Commit);
            return requests;
        };

        let index = select_next(self.active_buffer, self.last_rendered_buffer, self.buffer_count);
        requests.extend([
            SurfaceRequest::Render { index },
            SurfaceRequest::Attach { index },
            SurfaceRequest::DamageBuffer {
                width: size.width,
                height: size.height,
            },
            SurfaceRequest::Commit,
        ]);
        self.last_rendered_buffer = Some(index);
        self.active_buffer = Some(index);
        requests
    }

    pub fn phase(&self) -> SurfacePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops the session without a close request, e.g. after a fatal error.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn geometry(&self) -> Option<Size> {
        self.geometry
    }

    pub fn active_buffer(&self) -> Option<usize> {
        self.active_buffer
    }

    pub fn last_rendered_buffer(&self) -> Option<usize> {
        self.last_rendered_buffer
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    pub fn animation_speed(&self) -> i32 {
        self.animation_speed
    }

    pub fn set_animation_speed(&mut self, speed: i32) {
        self.animation_speed = speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::SurfaceRequest::*;

    fn presenting() -> SurfaceState {
        let mut state = SurfaceState::new(3, Size::default());
        state.handle(SurfaceEvent::Created);
        state.handle(SurfaceEvent::ToplevelConfigure {
            width: 800,
            height: 600,
        });
        state.handle(SurfaceEvent::SurfaceConfigure { serial: 1 });
        state
    }

    fn frame_requests(requests: &[SurfaceRequest]) -> usize {
        requests.iter().filter(|r| **r == RequestFrame).count()
    }

    #[test]
    fn test_creation_arms_first_frame_and_commits() {
        let mut state = SurfaceState::new(3, Size::default());
        assert_eq!(state.phase(), SurfacePhase::Uninitialized);
        assert_eq!(state.handle(SurfaceEvent::Created), vec![RequestFrame, Commit]);
        assert_eq!(state.phase(), SurfacePhase::AwaitingFirstConfigure);
        assert!(state.handle(SurfaceEvent::Created).is_empty());
    }

    #[test]
    fn test_first_configure_attaches_buffer_zero() {
        let mut state = SurfaceState::new(3, Size::default());
        state.handle(SurfaceEvent::Created);
        state.handle(SurfaceEvent::ToplevelConfigure {
            width: 0,
            height: 0,
        });

        let first = state.handle(SurfaceEvent::SurfaceConfigure { serial: 1 });
        assert_eq!(first, vec![AckConfigure { serial: 1 }, Attach { index: 0 }, Commit]);
        assert_eq!(state.phase(), SurfacePhase::Presenting);
        assert_eq!(state.active_buffer(), Some(0));

        let second = state.handle(SurfaceEvent::SurfaceConfigure { serial: 2 });
        assert_eq!(second, vec![AckConfigure { serial: 2 }, Commit]);
    }

    #[test]
    fn test_first_configure_without_toplevel_size_sets_up_default_buffers() {
        let mut state = SurfaceState::new(3, Size::default());
        state.handle(SurfaceEvent::Created);
        let requests = state.handle(SurfaceEvent::SurfaceConfigure { serial: 7 });
        assert_eq!(
            requests,
            vec![
                AckConfigure { serial: 7 },
                SetupBuffers {
                    width: 1280,
                    height: 720
                },
                Attach { index: 0 },
                Commit
            ]
        );
    }

    #[test]
    fn test_resize_rebuilds_buffers_and_detaches() {
        let mut state = presenting();
        state.handle(SurfaceEvent::FrameDone { time: 16 });
        assert_eq!(state.active_buffer(), Some(1));

        let requests = state.handle(SurfaceEvent::ToplevelConfigure {
            width: 1024,
            height: 768,
        });
        assert_eq!(
            requests,
            vec![SetupBuffers {
                width: 1024,
                height: 768
            }]
        );
        assert_eq!(state.active_buffer(), None);
        assert_eq!(state.last_rendered_buffer(), None);
        assert_eq!(state.geometry(), Some(Size::new(1024, 768)));
    }

    #[test]
    fn test_zero_configure_keeps_established_size() {
        let mut state = presenting();
        let requests = state.handle(SurfaceEvent::ToplevelConfigure {
            width: 0,
            height: 0,
        });
        assert!(requests.is_empty());
        assert_eq!(state.geometry(), Some(Size::new(800, 600)));
    }

    #[test]
    fn test_zero_configure_before_any_size_uses_default() {
        let mut state = SurfaceState::new(3, Size::new(640, 480));
        state.handle(SurfaceEvent::Created);
        let requests = state.handle(SurfaceEvent::ToplevelConfigure {
            width: 0,
            height: 0,
        });
        assert_eq!(
            requests,
            vec![SetupBuffers {
                width: 640,
                height: 480
            }]
        );
    }

    #[test]
    fn test_same_size_configure_does_not_reallocate() {
        let mut state = presenting();
        let requests = state.handle(SurfaceEvent::ToplevelConfigure {
            width: 800,
            height: 600,
        });
        assert!(requests.is_empty());
        assert_eq!(state.active_buffer(), Some(0));
    }

    #[test]
    fn test_frame_done_renders_attaches_damages_commits() {
        let mut state = presenting();
        let requests = state.handle(SurfaceEvent::FrameDone { time: 16 });
        assert_eq!(
            requests,
            vec![
                RequestFrame,
                Render { index: 1 },
                Attach { index: 1 },
                DamageBuffer {
                    width: 800,
                    height: 600
                },
                Commit
            ]
        );
        assert_eq!(state.last_rendered_buffer(), Some(1));
        assert_eq!(state.active_buffer(), Some(1));
    }

    #[test]
    fn test_frames_rotate_through_all_buffers() {
        let mut state = presenting();
        let rendered: Vec<usize> = (0..6)
            .map(|frame| {
                state
                    .handle(SurfaceEvent::FrameDone { time: frame * 16 })
                    .into_iter()
                    .find_map(|r| match r {
                        Render { index } => Some(index),
                        _ => None,
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(rendered, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_frame_after_resize_starts_at_buffer_zero() {
        let mut state = presenting();
        state.handle(SurfaceEvent::FrameDone { time: 16 });
        state.handle(SurfaceEvent::ToplevelConfigure {
            width: 320,
            height: 200,
        });
        let requests = state.handle(SurfaceEvent::FrameDone { time: 32 });
        assert!(requests.contains(&Render { index: 0 }));
        assert!(requests.contains(&DamageBuffer {
            width: 320,
            height: 200
        }));
    }

    #[test]
    fn test_every_frame_rearms_exactly_one_callback() {
        let mut state = SurfaceState::new(3, Size::default());
        assert_eq!(frame_requests(&state.handle(SurfaceEvent::Created)), 1);

        // The very first frame may arrive before any configure.
        let early = state.handle(SurfaceEvent::FrameDone { time: 0 });
        assert_eq!(early, vec![RequestFrame, Commit]);

        state.handle(SurfaceEvent::SurfaceConfigure { serial: 1 });
        for time in 1..10 {
            let requests = state.handle(SurfaceEvent::FrameDone { time: time * 16 });
            assert_eq!(frame_requests(&requests), 1);
            assert_eq!(requests[0], RequestFrame);
        }

        // Frames still in the batch that carried the close request.
        state.handle(SurfaceEvent::CloseRequested);
        let last = state.handle(SurfaceEvent::FrameDone { time: 500 });
        assert_eq!(frame_requests(&last), 1);
    }

    #[test]
    fn test_frame_before_first_ack_does_not_attach() {
        let mut state = SurfaceState::new(3, Size::default());
        state.handle(SurfaceEvent::Created);
        state.handle(SurfaceEvent::ToplevelConfigure {
            width: 800,
            height: 600,
        });
        let requests = state.handle(SurfaceEvent::FrameDone { time: 0 });
        assert_eq!(requests, vec![RequestFrame, Commit]);
        assert_eq!(state.active_buffer(), None);
    }

    #[test]
    fn test_close_request_stops_running() {
        let mut state = presenting();
        assert!(state.is_running());
        assert!(state.handle(SurfaceEvent::CloseRequested).is_empty());
        assert!(!state.is_running());
        assert_eq!(state.phase(), SurfacePhase::Closed);
    }

    #[test]
    fn test_frame_counter_reports_once_per_second() {
        let mut counter = FrameCounter::default();
        assert_eq!(counter.tick(0), None);
        for time in (16..1000).step_by(16) {
            assert_eq!(counter.tick(time), None);
        }
        let rate = counter.tick(1000).unwrap();
        assert!(rate > 60.0 && rate < 70.0, "rate was {rate}");
        assert_eq!(counter.tick(1016), None);
    }
}
