//! Filament extruder motor.

use super::driver::{DeviceError, StopAction, TachoDriver};
use crate::utils::{config::ExtruderConfig, math::conversion};

pub struct Extruder<M> {
    config: ExtruderConfig,
    driver: M,
    count_per_rot: i32,
}

impl<M: TachoDriver> Extruder<M> {
    pub fn new(
        config: ExtruderConfig,
        mut driver: M,
    ) -> Result<Self, DeviceError<M::Error>> {
        let count_per_rot = driver.count_per_rot().map_err(DeviceError::Motor)?;
        driver
            .set_stop_action(StopAction::Brake)
            .map_err(DeviceError::Motor)?;
        Ok(Self {
            config,
            driver,
            count_per_rot,
        })
    }

    pub fn config(&self) -> &ExtruderConfig {
        &self.config
    }

    pub fn driver(&self) -> &M {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut M {
        &mut self.driver
    }

    /// Millimeters of filament (or mm/s) to tacho counts (or counts/s).
    pub fn mm_to_tacho(
        &self,
        mm: f64,
    ) -> i32 {
        conversion::mm_to_tacho(mm, self.config.deg_mm_ratio, self.count_per_rot)
    }

    /// Feed filament at `velocity` mm/s until stopped. Negative retracts.
    pub fn run_at(
        &mut self,
        velocity: f64,
    ) -> Result<(), DeviceError<M::Error>> {
        let speed = self.mm_to_tacho(velocity);
        if speed == 0 {
            return self.stop();
        }
        self.driver.set_speed_sp(speed).map_err(DeviceError::Motor)?;
        self.driver.run_forever().map_err(DeviceError::Motor)
    }

    pub fn stop(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.driver.stop().map_err(DeviceError::Motor)
    }

    pub fn release(&mut self) -> Result<(), DeviceError<M::Error>> {
        self.driver
            .set_stop_action(StopAction::Coast)
            .map_err(DeviceError::Motor)?;
        self.stop()
    }
}
