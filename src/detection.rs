use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// Contains left-top corner (x,y) and (width,height) of a blob's bounding rect
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Detection {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Detection {
    #[inline]
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Integer center of the rect, halves are floored.
    ///
    /// Coordinates past `i32::MAX` saturate; in-frame rects never get there.
    #[inline]
    pub fn centroid(&self) -> na::Point2<i32> {
        na::Point2::new(center(self.x, self.w), center(self.y, self.h))
    }

    #[inline(always)]
    pub fn cy(&self) -> i32 {
        self.centroid().y
    }

    #[inline(always)]
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    #[inline(always)]
    pub fn right(&self) -> u64 {
        self.x as u64 + self.w as u64
    }

    #[inline(always)]
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.h as u64
    }

    /// Whole rect lies within a `width` x `height` frame
    #[inline]
    pub fn fits(&self, (width, height): (u32, u32)) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

#[inline(always)]
fn center(pos: u32, len: u32) -> i32 {
    (pos as i64 + (len / 2) as i64).min(i32::MAX as i64) as i32
}
