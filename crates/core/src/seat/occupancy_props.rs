//! Property-based tests for the occupancy state machine.
//!
//! Random assign/unassign sequences over a small library must keep the
//! relation one-to-one: a seat's occupant points back at the seat and no
//! seat is referenced by two students.

use chrono::NaiveDate;
use proptest::prelude::*;

use carrel_shared::types::LibraryId;

use super::occupancy::{OccupancyChange, plan_assign, plan_unassign};
use super::types::{NewSeat, Seat};
use crate::student::{NewStudent, Student};

#[derive(Debug, Clone)]
enum Op {
    Assign { seat: usize, student: usize },
    Unassign { seat: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 0usize..4).prop_map(|(seat, student)| Op::Assign { seat, student }),
        (0usize..3).prop_map(|seat| Op::Unassign { seat }),
    ]
}

struct World {
    seats: Vec<Seat>,
    students: Vec<Student>,
}

impl World {
    fn new() -> Self {
        let lib = LibraryId::new();
        let seats = ["A1", "A2", "B1"]
            .iter()
            .map(|n| {
                NewSeat {
                    seat_number: (*n).to_string(),
                    floor: String::new(),
                }
                .into_seat(lib)
                .unwrap()
            })
            .collect();
        let students = (0..4)
            .map(|i| {
                NewStudent {
                    full_name: format!("Student {i}"),
                    ..Default::default()
                }
                .into_student(lib, None, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
                .unwrap()
            })
            .collect();
        Self { seats, students }
    }

    fn apply(&mut self, change: &OccupancyChange) {
        for write in &change.seats {
            let seat = self.seats.iter_mut().find(|s| s.id == write.seat_id).unwrap();
            assert_eq!(seat.version, write.expected_version);
            seat.occupant_student_id = write.occupant;
            seat.version += 1;
        }
        for write in &change.students {
            let student = self
                .students
                .iter_mut()
                .find(|s| s.id == write.student_id)
                .unwrap();
            student.seat_id = write.seat_id;
        }
    }

    fn current_seat_of(&self, student: &Student) -> Option<Seat> {
        student
            .seat_id
            .and_then(|id| self.seats.iter().find(|s| s.id == id).cloned())
    }

    fn is_consistent(&self) -> bool {
        let seats_ok = self.seats.iter().all(|seat| match seat.occupant_student_id {
            Some(occupant) => self
                .students
                .iter()
                .find(|s| s.id == occupant)
                .is_some_and(|s| s.seat_id == Some(seat.id)),
            None => self.students.iter().all(|s| s.seat_id != Some(seat.id)),
        });
        let students_ok = self.students.iter().all(|student| match student.seat_id {
            Some(seat_id) => self
                .seats
                .iter()
                .find(|s| s.id == seat_id)
                .is_some_and(|s| s.occupant_student_id == Some(student.id)),
            None => true,
        });
        seats_ok && students_ok
    }
}

proptest! {
    #[test]
    fn prop_occupancy_stays_one_to_one(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut world = World::new();

        for op in ops {
            let change = match op {
                Op::Assign { seat, student } => {
                    let target = world.seats[seat].clone();
                    let who = world.students[student].clone();
                    let current = world.current_seat_of(&who);
                    plan_assign(&target, &who, current.as_ref(), None).unwrap()
                }
                Op::Unassign { seat } => plan_unassign(&world.seats[seat]),
            };
            world.apply(&change);
            prop_assert!(world.is_consistent());
        }
    }

    #[test]
    fn prop_assign_always_seats_the_student(seat in 0usize..3, student in 0usize..4, warmup in prop::collection::vec(op_strategy(), 0..10)) {
        let mut world = World::new();
        for op in warmup {
            let change = match op {
                Op::Assign { seat, student } => {
                    let current = world.current_seat_of(&world.students[student]);
                    plan_assign(&world.seats[seat], &world.students[student], current.as_ref(), None).unwrap()
                }
                Op::Unassign { seat } => plan_unassign(&world.seats[seat]),
            };
            world.apply(&change);
        }

        let current = world.current_seat_of(&world.students[student]);
        let change = plan_assign(&world.seats[seat], &world.students[student], current.as_ref(), None).unwrap();
        world.apply(&change);

        prop_assert_eq!(world.seats[seat].occupant_student_id, Some(world.students[student].id));
        prop_assert_eq!(world.students[student].seat_id, Some(world.seats[seat].id));
    }
}
