use serde_derive::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub frame: u64,
    pub id: u32,
    pub direction: Direction,
}

/// Running totals; `total` is derived, never stored
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub up: u64,
    pub down: u64,
}

impl Counts {
    #[inline]
    pub fn total(&self) -> u64 {
        self.up + self.down
    }

    #[inline]
    pub fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Up => self.up += 1,
            Direction::Down => self.down += 1,
        }
    }
}

/// Top to bottom is `Down`, bottom to top is `Up`.
///
/// The "before" side is strict on both rules, so a previous position lying
/// exactly on the line never fires.
#[inline]
pub fn check_crossing(prev_y: Option<i32>, cy: i32, line: i32) -> Option<Direction> {
    let prev_y = prev_y?;

    if prev_y < line && cy >= line {
        Some(Direction::Down)
    } else if prev_y > line && cy <= line {
        Some(Direction::Up)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downward_and_upward() {
        assert_eq!(check_crossing(Some(100), 150, 120), Some(Direction::Down));
        assert_eq!(check_crossing(Some(150), 90, 120), Some(Direction::Up));
    }

    #[test]
    fn landing_on_line_counts() {
        assert_eq!(check_crossing(Some(119), 120, 120), Some(Direction::Down));
        assert_eq!(check_crossing(Some(121), 120, 120), Some(Direction::Up));
    }

    #[test]
    fn starting_on_line_never_counts() {
        for cy in [0, 119, 120, 121, 500] {
            assert_eq!(check_crossing(Some(120), cy, 120), None);
        }
    }

    #[test]
    fn no_history_no_crossing() {
        assert_eq!(check_crossing(None, 150, 120), None);
    }

    #[test]
    fn same_side_moves_are_ignored() {
        assert_eq!(check_crossing(Some(10), 100, 120), None);
        assert_eq!(check_crossing(Some(300), 121, 120), None);
    }

    #[test]
    fn counts_total() {
        let mut counts = Counts::default();
        counts.record(Direction::Up);
        counts.record(Direction::Down);
        counts.record(Direction::Down);

        assert_eq!(counts, Counts { up: 1, down: 2 });
        assert_eq!(counts.total(), 3);
    }
}
