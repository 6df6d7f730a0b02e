//! GPU timer query pair (§4.1.1): start/end timestamps bracketing a frame's
//! `begin_draw`/`end_draw`. Requires `GL_TIMESTAMP`-capable queries
//! (desktop GL 3.3+ / `GL_EXT_disjoint_timer_query` on GLES).

use glow::HasContext;

#[derive(Debug)]
pub struct TimerQuery {
    start: glow::Query,
    end: glow::Query,
    in_flight: bool,
}

impl TimerQuery {
    pub fn new(gl: &glow::Context) -> Option<Self> {
        unsafe {
            let start = gl.create_query().ok()?;
            let end = gl.create_query().ok()?;
            Some(TimerQuery { start, end, in_flight: false })
        }
    }

    /// Best-effort (§7): a duplicate `begin` within the same frame is
    /// ignored rather than corrupting the in-flight pair.
    pub fn begin(&mut self, gl: &glow::Context) {
        if self.in_flight {
            log::debug!("timer query already active this frame; ignoring duplicate begin");
            return;
        }
        unsafe { gl.query_counter(self.start, glow::TIMESTAMP) };
        self.in_flight = true;
    }

    pub fn end(&mut self, gl: &glow::Context) {
        if !self.in_flight {
            return;
        }
        unsafe { gl.query_counter(self.end, glow::TIMESTAMP) };
    }

    pub fn result_ns(&mut self, gl: &glow::Context) -> Option<u64> {
        if !self.in_flight {
            return None;
        }
        unsafe {
            if gl.get_query_parameter_u32(self.end, glow::QUERY_RESULT_AVAILABLE) == 0 {
                return None;
            }
            let start = gl.get_query_parameter_u64_with_offset(self.start, glow::QUERY_RESULT, 0) as u64;
            let end = gl.get_query_parameter_u64_with_offset(self.end, glow::QUERY_RESULT, 0) as u64;
            self.in_flight = false;
            Some(end.saturating_sub(start))
        }
    }
}

impl Drop for TimerQuery {
    fn drop(&mut self) {
        // No handle to a live `gl` stored here by design (queries are
        // cheap and this struct is always torn down alongside the device
        // that owns the context); the device's own `uninit` path deletes
        // them explicitly before the context goes away.
    }
}
