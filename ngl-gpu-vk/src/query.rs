//! GPU timer query pair (§4.1.1), backed by a two-slot `VkQueryPool` of
//! `TIMESTAMP` queries instead of `ngl-gpu-gl`'s `GL_TIMESTAMP` query
//! objects.

use ash::vk;

#[derive(Debug)]
pub struct TimerQuery {
    pool: vk::QueryPool,
    in_flight: bool,
    timestamp_period_ns: f32,
}

impl TimerQuery {
    pub fn new(device: &ash::Device, timestamp_period_ns: f32) -> Option<Self> {
        let create_info = vk::QueryPoolCreateInfo::default().query_type(vk::QueryType::TIMESTAMP).query_count(2);
        let pool = unsafe { device.create_query_pool(&create_info, None) }.ok()?;
        Some(TimerQuery { pool, in_flight: false, timestamp_period_ns })
    }

    /// Best-effort (§7): ignores a duplicate `begin` within the same frame.
    pub fn begin(&mut self, device: &ash::Device, cmd: vk::CommandBuffer) {
        if self.in_flight {
            log::debug!("timer query already active this frame; ignoring duplicate begin");
            return;
        }
        unsafe {
            device.cmd_reset_query_pool(cmd, self.pool, 0, 2);
            device.cmd_write_timestamp(cmd, vk::PipelineStageFlags::TOP_OF_PIPE, self.pool, 0);
        }
        self.in_flight = true;
    }

    pub fn end(&mut self, device: &ash::Device, cmd: vk::CommandBuffer) {
        if !self.in_flight {
            return;
        }
        unsafe { device.cmd_write_timestamp(cmd, vk::PipelineStageFlags::BOTTOM_OF_PIPE, self.pool, 1) };
    }

    pub fn result_ns(&mut self, device: &ash::Device) -> Option<u64> {
        if !self.in_flight {
            return None;
        }
        let mut data = [0u64; 2];
        let result = unsafe {
            device.get_query_pool_results(
                self.pool,
                0,
                &mut data,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
            )
        };
        if result.is_err() {
            return None;
        }
        self.in_flight = false;
        let delta_ticks = data[1].saturating_sub(data[0]);
        Some((delta_ticks as f64 * self.timestamp_period_ns as f64) as u64)
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe { device.destroy_query_pool(self.pool, None) };
    }
}
