use image::{GrayImage, Luma};
use ndarray::{s, Array2, Array5, ArrayView2, Axis};
use rand::Rng;

use crate::error::{Result, TethermapError};

/// Axis order of an [`ImageStack`].
pub const AXES: [&str; 5] = ["time", "plane", "channel", "y", "x"];

/// Read-only 5-D intensity stack, laid out as time, plane, channel, y, x.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStack {
    data: Array5<u16>,
}

impl ImageStack {
    pub fn new(data: Array5<u16>) -> Result<Self> {
        if data.is_empty() {
            return Err(TethermapError::InvalidArgument(format!(
                "image stack has an empty axis: {:?}",
                data.shape()
            )));
        }
        Ok(Self { data })
    }

    /// Uniform noise stack used when no image is loaded.
    pub fn random<R: Rng>(shape: [usize; 5], max: u16, rng: &mut R) -> Result<Self> {
        let data = Array5::from_shape_fn(shape, |_| rng.random_range(0..=max));
        Self::new(data)
    }

    pub fn shape(&self) -> [usize; 5] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3], s[4]]
    }

    pub fn time_points(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn planes(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Brightest value for each (time, channel), used as the default upper
    /// contrast limit.
    pub fn max_per_time_channel(&self) -> Array2<u16> {
        let (t_len, c_len) = (self.time_points(), self.channels());
        Array2::from_shape_fn((t_len, c_len), |(t, c)| {
            self.data
                .slice(s![t, .., c, .., ..])
                .iter()
                .copied()
                .max()
                .unwrap_or(0)
        })
    }

    /// Reverses one axis in place, e.g. to match a viewer's plane order.
    pub fn flip_axis(&mut self, axis: usize) -> Result<()> {
        if axis >= 5 {
            return Err(TethermapError::InvalidArgument(format!(
                "axis {axis} out of range for a 5-D stack"
            )));
        }
        self.data.invert_axis(Axis(axis));
        Ok(())
    }

    fn check_index(&self, time: usize, plane: usize, channel: usize) -> Result<()> {
        let [t_len, z_len, c_len, _, _] = self.shape();
        if time >= t_len || plane >= z_len || channel >= c_len {
            return Err(TethermapError::InvalidArgument(format!(
                "plane index ({time}, {plane}, {channel}) out of bounds for stack {:?}",
                self.shape()
            )));
        }
        Ok(())
    }

    pub fn plane(&self, time: usize, plane: usize, channel: usize) -> Result<ArrayView2<'_, u16>> {
        self.check_index(time, plane, channel)?;
        Ok(self.data.slice(s![time, plane, channel, .., ..]))
    }

    /// 8-bit rendering of one plane with a linear contrast window. Values at
    /// or below `min` map to 0, at or above `max` to 255.
    pub fn plane_u8(
        &self,
        time: usize,
        plane: usize,
        channel: usize,
        min: u16,
        max: u16,
    ) -> Result<GrayImage> {
        if min >= max {
            return Err(TethermapError::InvalidArgument(format!(
                "contrast window [{min}, {max}] is empty"
            )));
        }
        let view = self.plane(time, plane, channel)?;
        let (height, width) = view.dim();
        let range = f64::from(max - min);

        let mut img = GrayImage::new(width as u32, height as u32);
        for ((y, x), &v) in view.indexed_iter() {
            let clamped = v.clamp(min, max);
            let scaled = (f64::from(clamped - min) / range * 255.0).round() as u8;
            img.put_pixel(x as u32, y as u32, Luma([scaled]));
        }
        Ok(img)
    }
}
