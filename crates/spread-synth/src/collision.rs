//! Collision planning for multi-emission frames
//!
//! A collision scene places two packets so that they overlap in time and
//! frequency. Packets can only sit on the channel grid of their class, so the
//! planner searches the grid of the second class for offsets that overlap
//! the first packet.

use rand::Rng;
use rand::seq::SliceRandom;
use spread_core::merge::spans_overlap;
use spread_core::{AugmentChannel, ClassTables};
use thiserror::Error;

/// Tolerance (bins) under which near-adjacent packets count as colliding
pub const DEFAULT_COLLISION_ERROR: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollisionError {
    #[error("class {class} has no channel table")]
    UnknownClass { class: i32 },

    #[error("class {class} has no channel {channel}")]
    UnknownChannel { class: i32, channel: u32 },
}

/// One transmission setting of a recording: class and channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub class: i32,
    /// `None` for classes without fixed channels
    pub channel: Option<u32>,
}

/// Left offsets of the channel grid of a class for a packet of `packet_width`.
///
/// The grid runs from `start` in steps of `space * skip` and stops before
/// `limit_index - packet_width`.
pub fn channel_offsets(
    augment: &AugmentChannel,
    packet_width: usize,
    limit_index: usize,
    skip: usize,
) -> Vec<usize> {
    let end = limit_index.saturating_sub(packet_width);
    let step = (augment.space * skip).max(1);
    (augment.start..end).step_by(step).collect()
}

/// Pick a left offset from `range2` that makes a packet of `width2` collide
/// with the packet at `[left_offset1, left_offset1 + width1]`.
///
/// `range2` must be ascending. `error` shrinks both spans so that barely
/// touching placements are not counted. Returns `None` when no offset
/// collides.
pub fn check_collision<R: Rng + ?Sized>(
    left_offset1: usize,
    width1: usize,
    range2: &[usize],
    width2: usize,
    error: usize,
    rng: &mut R,
) -> Option<usize> {
    let mut choices = Vec::new();
    for &lo2 in range2 {
        if left_offset1 + error > lo2 + width2 {
            continue;
        }
        if lo2 + error > left_offset1 + width1 {
            break;
        }
        choices.push(lo2);
    }

    choices.choose(rng).copied()
}

/// True when any two transmissions overlap in frequency.
///
/// Classes without fixed channels are skipped.
pub fn do_collide(
    transmissions: &[Transmission],
    tables: &ClassTables,
) -> Result<bool, CollisionError> {
    let mut ranges = Vec::new();
    for t in transmissions {
        let geometry = tables
            .channels
            .get(&t.class)
            .ok_or(CollisionError::UnknownClass { class: t.class })?;
        let Some(channel) = t.channel.filter(|_| geometry.is_defined()) else {
            continue;
        };
        let range = geometry.range(channel).ok_or(CollisionError::UnknownChannel {
            class: t.class,
            channel,
        })?;
        ranges.push(range);
    }

    for (i, a) in ranges.iter().enumerate() {
        for b in &ranges[i + 1..] {
            if spans_overlap(a.0, a.1, b.0, b.1) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Placement rectangle of a packet in a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub left: usize,
    pub top: usize,
    pub length: usize,
    pub width: usize,
}

impl Placement {
    /// Whether `other` lies entirely inside this rectangle
    pub fn covers(&self, other: &Placement) -> bool {
        self.left <= other.left
            && self.left + self.width >= other.left + other.width
            && self.top <= other.top
            && self.top + self.length >= other.top + other.length
    }
}

/// A packet to be placed in a collision scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionPacket {
    pub class: i32,
    pub length: usize,
    pub width: usize,
    /// SNR reduction (dB) applied to the packet
    pub attenuation: f64,
    /// Stays visible even when fully covered by a stronger packet
    pub always_visible: bool,
}

/// Frame geometry and search limits for collision planning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionBounds {
    pub frame_height: usize,
    pub limit_index: usize,
    pub error: usize,
    pub max_attempts: usize,
}

/// Random placement of two packets that collide visibly.
///
/// Packet 1 goes on a random channel of its class at a random time, packet 2
/// on a colliding channel of its class, starting within half a packet of
/// packet 1. Scenes where the attenuated packet vanishes under the other one
/// are rejected. Returns `None` after `max_attempts` failed draws.
pub fn plan_collision<R: Rng + ?Sized>(
    first: &CollisionPacket,
    second: &CollisionPacket,
    tables: &ClassTables,
    bounds: &CollisionBounds,
    rng: &mut R,
) -> Option<(Placement, Placement)> {
    let augment1 = tables.augment.get(&first.class)?;
    let augment2 = tables.augment.get(&second.class)?;
    let grid1 = channel_offsets(augment1, first.width, bounds.limit_index, 1);
    let grid2 = channel_offsets(augment2, second.width, bounds.limit_index, 1);
    let height = bounds.frame_height;
    if grid1.is_empty() || grid2.is_empty() || first.length > height || second.length > height {
        return None;
    }

    for _ in 0..bounds.max_attempts {
        let left1 = *grid1.choose(rng)?;
        let top1 = rng.gen_range(0..=height - first.length);

        let candidate = check_collision(left1, first.width, &grid2, second.width, bounds.error, rng);
        let Some(left2) = candidate else {
            continue;
        };

        let latest = height - second.length;
        let low = top1.saturating_sub(second.length / 2).min(latest);
        let high = (top1 + first.length / 2).min(latest);
        let top2 = rng.gen_range(low..=high.max(low));

        let p1 = Placement {
            left: left1,
            top: top1,
            length: first.length,
            width: first.width,
        };
        let p2 = Placement {
            left: left2,
            top: top2,
            length: second.length,
            width: second.width,
        };

        let hidden = (p1.covers(&p2) && first.attenuation < second.attenuation && !second.always_visible)
            || (p2.covers(&p1) && second.attenuation < first.attenuation && !first.always_visible);
        if hidden {
            continue;
        }

        return Some((p1, p2));
    }

    tracing::warn!(
        "No visible collision of classes {} and {} after {} attempts",
        first.class,
        second.class,
        bounds.max_attempts
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_no_collision_possible() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(check_collision(0, 10, &[50, 60, 70], 5, 5, &mut rng), None);
    }

    #[test]
    fn test_collision_candidates() {
        let mut rng = StdRng::seed_from_u64(7);
        let range2 = [0, 10, 20, 30, 40, 50];
        for _ in 0..50 {
            let lo2 = check_collision(20, 15, &range2, 10, 5, &mut rng).unwrap();
            // 10 only touches the first packet, 40 starts past its end
            assert!(lo2 == 20 || lo2 == 30, "unexpected offset {}", lo2);
        }
    }

    #[test]
    fn test_collision_is_reproducible() {
        let range2: Vec<usize> = (0..200).step_by(5).collect();
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| check_collision(50, 60, &range2, 20, 5, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(3), pick(3));
    }

    #[test]
    fn test_channel_offsets() {
        let augment = AugmentChannel { start: 56, space: 25, skip: 2 };
        assert_eq!(channel_offsets(&augment, 300, 476, 2), vec![56, 106, 156]);
        assert_eq!(channel_offsets(&augment, 300, 476, 1).len(), 5);
        assert!(channel_offsets(&augment, 500, 476, 1).is_empty());
    }

    #[test]
    fn test_do_collide() {
        let tables = ClassTables::default();
        let wifi = |ch| Transmission { class: 0, channel: Some(ch) };
        let zigbee = |ch| Transmission { class: 2, channel: Some(ch) };
        let bluetooth = Transmission { class: 1, channel: None };

        // wifi channel 0 covers 2401..2423, zigbee 11 sits at 2405
        assert_eq!(do_collide(&[wifi(0), zigbee(11)], &tables), Ok(true));
        // wifi channels 0 and 10 are far apart, zigbee 26 at 2480 is clear of both
        assert_eq!(do_collide(&[wifi(0), wifi(10), zigbee(26)], &tables), Ok(false));
        assert_eq!(do_collide(&[bluetooth, wifi(0)], &tables), Ok(false));
        assert_eq!(
            do_collide(&[wifi(40)], &tables),
            Err(CollisionError::UnknownChannel { class: 0, channel: 40 })
        );
    }

    #[test]
    fn test_plan_collision_overlaps() {
        let tables = ClassTables::default();
        let bounds = CollisionBounds {
            frame_height: 512,
            limit_index: 476,
            error: DEFAULT_COLLISION_ERROR,
            max_attempts: 1000,
        };
        let wifi = CollisionPacket {
            class: 0,
            length: 200,
            width: 100,
            attenuation: 0.0,
            always_visible: false,
        };
        let zigbee = CollisionPacket {
            class: 2,
            length: 120,
            width: 12,
            attenuation: 10.0,
            always_visible: false,
        };

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let (p1, p2) = plan_collision(&wifi, &zigbee, &tables, &bounds, &mut rng).unwrap();
            assert!(p1.top + p1.length <= 512 && p2.top + p2.length <= 512);
            assert!(p2.left + p2.width + bounds.error >= p1.left);
            assert!(p2.left + bounds.error <= p1.left + p1.width);
            assert!(p2.top + p2.length >= p1.top && p2.top <= p1.top + p1.length);
            assert!(!p1.covers(&p2) || !(wifi.attenuation < zigbee.attenuation));
        }
    }
}
