use serde::{Deserialize, Serialize};

pub const SLOT_COUNT: usize = 12;

/// Fixed exam-day timetable. Slot `i` seats the candidate whose
/// `order == i + 1`; entries past the last slot have no time mapping.
pub const SLOT_TIMES: [(&str, &str); SLOT_COUNT] = [
    ("08:20", "08:55"),
    ("09:00", "09:35"),
    ("09:40", "10:15"),
    ("10:20", "10:55"),
    ("11:00", "11:35"),
    ("11:40", "12:15"),
    ("13:15", "13:50"),
    ("13:55", "14:30"),
    ("14:35", "15:10"),
    ("15:15", "15:50"),
    ("15:55", "16:30"),
    ("16:35", "17:10"),
];

pub fn slot_times(order: u32) -> Option<(&'static str, &'static str)> {
    if order == 0 {
        return None;
    }
    SLOT_TIMES.get(order as usize - 1).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamDay {
    Saturday,
    Sunday,
}

impl ExamDay {
    pub fn parse(s: &str) -> Option<ExamDay> {
        match s {
            "saturday" => Some(ExamDay::Saturday),
            "sunday" => Some(ExamDay::Sunday),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExamDay::Saturday => "saturday",
            ExamDay::Sunday => "sunday",
        }
    }

    pub fn other(self) -> ExamDay {
        match self {
            ExamDay::Saturday => ExamDay::Sunday,
            ExamDay::Sunday => ExamDay::Saturday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    pub fn parse(s: &str) -> Option<MoveDirection> {
        match s {
            "up" => Some(MoveDirection::Up),
            "down" => Some(MoveDirection::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamCandidate {
    pub id: String,
    pub name: String,
    pub license_type: String,
    pub order: u32,
}

/// Orders are always contiguous from 1; every mutation below re-establishes
/// this before returning.
pub fn renumber(list: &mut [ExamCandidate]) {
    for (i, c) in list.iter_mut().enumerate() {
        c.order = (i + 1) as u32;
    }
}

/// Swaps the candidate at `index` with its neighbour. Boundary and
/// out-of-range indexes are no-ops reported as `false`.
pub fn move_candidate(list: &mut [ExamCandidate], index: usize, direction: MoveDirection) -> bool {
    let target = match direction {
        MoveDirection::Up => {
            if index == 0 || index >= list.len() {
                return false;
            }
            index - 1
        }
        MoveDirection::Down => {
            if index + 1 >= list.len() {
                return false;
            }
            index + 1
        }
    };
    list.swap(index, target);
    renumber(list);
    true
}

/// Moves the candidate to the end of the other day's list
/// (`order` = that list's prior length + 1). `false` when the id is absent.
pub fn switch_day(
    from: &mut Vec<ExamCandidate>,
    to: &mut Vec<ExamCandidate>,
    candidate_id: &str,
) -> bool {
    let Some(pos) = from.iter().position(|c| c.id == candidate_id) else {
        return false;
    };
    let mut candidate = from.remove(pos);
    candidate.order = (to.len() + 1) as u32;
    to.push(candidate);
    renumber(from);
    true
}

/// Deletes the candidate and renumbers the survivors. `false` (and no
/// change) when the id is absent.
pub fn remove_candidate(list: &mut Vec<ExamCandidate>, candidate_id: &str) -> bool {
    let Some(pos) = list.iter().position(|c| c.id == candidate_id) else {
        return false;
    };
    list.remove(pos);
    renumber(list);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Vec<ExamCandidate> {
        (1..=n)
            .map(|i| ExamCandidate {
                id: format!("c{i}"),
                name: format!("Aday {i}"),
                license_type: "B".to_string(),
                order: i as u32,
            })
            .collect()
    }

    #[test]
    fn move_up_then_down_is_self_inverse() {
        let original = sample(5);
        for index in 1..original.len() {
            let mut list = original.clone();
            assert!(move_candidate(&mut list, index, MoveDirection::Up));
            assert!(move_candidate(&mut list, index - 1, MoveDirection::Down));
            assert_eq!(list, original);
        }
    }

    #[test]
    fn boundary_moves_are_noops() {
        let original = sample(4);
        let mut list = original.clone();
        assert!(!move_candidate(&mut list, 0, MoveDirection::Up));
        assert!(!move_candidate(&mut list, 3, MoveDirection::Down));
        assert!(!move_candidate(&mut list, 17, MoveDirection::Up));
        assert!(!move_candidate(&mut list, 17, MoveDirection::Down));
        assert_eq!(list, original);
    }

    #[test]
    fn move_refreshes_orders_from_position() {
        let mut list = sample(3);
        assert!(move_candidate(&mut list, 2, MoveDirection::Up));
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c3", "c2"]);
        let orders: Vec<u32> = list.iter().map(|c| c.order).collect();
        assert_eq!(orders, [1, 2, 3]);
    }

    #[test]
    fn switch_day_appends_and_conserves_total() {
        let mut saturday = sample(3);
        let mut sunday = sample(2);
        assert!(switch_day(&mut saturday, &mut sunday, "c2"));
        assert_eq!(saturday.len() + sunday.len(), 5);
        assert_eq!(sunday.last().map(|c| c.id.as_str()), Some("c2"));
        assert_eq!(sunday.last().map(|c| c.order), Some(3));
        let orders: Vec<u32> = saturday.iter().map(|c| c.order).collect();
        assert_eq!(orders, [1, 2]);
    }

    #[test]
    fn switch_day_missing_id_changes_nothing() {
        let mut saturday = sample(2);
        let mut sunday = sample(1);
        assert!(!switch_day(&mut saturday, &mut sunday, "nope"));
        assert_eq!(saturday.len(), 2);
        assert_eq!(sunday.len(), 1);
    }

    #[test]
    fn remove_renumbers_survivors() {
        let mut list = sample(4);
        assert!(remove_candidate(&mut list, "c2"));
        let ids: Vec<&str> = list.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c3", "c4"]);
        let orders: Vec<u32> = list.iter().map(|c| c.order).collect();
        assert_eq!(orders, [1, 2, 3]);
    }

    #[test]
    fn remove_missing_id_is_a_noop() {
        let original = sample(3);
        let mut list = original.clone();
        assert!(!remove_candidate(&mut list, "zz"));
        assert_eq!(list, original);
    }

    #[test]
    fn slot_times_cover_exactly_twelve_orders() {
        assert_eq!(slot_times(0), None);
        assert_eq!(slot_times(1), Some(("08:20", "08:55")));
        assert_eq!(slot_times(7), Some(("13:15", "13:50")));
        assert_eq!(slot_times(12), Some(("16:35", "17:10")));
        assert_eq!(slot_times(13), None);
    }
}
