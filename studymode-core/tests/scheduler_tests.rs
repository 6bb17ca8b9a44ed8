use chrono::{DateTime, Duration, TimeZone, Utc};
use studymode_core::{schedule, Card, CoreError, Schedule, EF_MIN};

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap() + Duration::days(n)
}

#[test]
fn deterministic_for_fixed_inputs() {
    let s = Schedule {
        ef: 2.36,
        interval: 11,
        repetitions: 4,
        next_review: day(3),
    };
    for q in 0..=5 {
        assert_eq!(schedule(&s, q, day(3)).unwrap(), schedule(&s, q, day(3)).unwrap());
    }
}

#[test]
fn ef_never_below_floor() {
    let mut s = Schedule::initial(day(0));
    for _ in 0..20 {
        s = schedule(&s, 0, day(0)).unwrap();
        assert!(s.ef >= EF_MIN);
    }
    assert_eq!(s.ef, EF_MIN);
}

#[test]
fn ef_non_decreasing_in_quality() {
    let s = Schedule {
        ef: 2.1,
        interval: 6,
        repetitions: 2,
        next_review: day(0),
    };
    let efs: Vec<f64> = (0..=5).map(|q| schedule(&s, q, day(0)).unwrap().ef).collect();
    assert!(efs.windows(2).all(|w| w[0] <= w[1]), "{efs:?}");
}

#[test]
fn lapse_resets_progress() {
    for q in 0..3 {
        let s = Schedule {
            ef: 2.7,
            interval: 120,
            repetitions: 9,
            next_review: day(0),
        };
        let out = schedule(&s, q, day(10)).unwrap();
        assert_eq!(out.repetitions, 0);
        assert_eq!(out.interval, 1);
        assert_eq!(out.next_review, day(11));
    }
}

#[test]
fn progression_is_strictly_increasing() {
    let mut s = Schedule::initial(day(0));
    let mut intervals = Vec::new();
    for _ in 0..8 {
        s = schedule(&s, 3, s.next_review).unwrap();
        intervals.push(s.interval);
    }
    assert_eq!(&intervals[..2], &[1, 6]);
    assert!(intervals.windows(2).all(|w| w[0] < w[1]), "{intervals:?}");
}

#[test]
fn progression_follows_rounded_products() {
    let mut s = Schedule::initial(day(0));
    s = schedule(&s, 4, day(0)).unwrap();
    s = schedule(&s, 4, day(0)).unwrap();
    let s3 = schedule(&s, 4, day(0)).unwrap();
    assert_eq!(s3.interval, (6.0 * s3.ef).round_ties_even() as u32);
    let s4 = schedule(&s3, 4, day(0)).unwrap();
    assert_eq!(s4.interval, (s3.interval as f64 * s4.ef).round_ties_even() as u32);
}

#[test]
fn three_perfect_reviews_from_new() {
    let card = Card::new(1, "What is 2+2?", "4", day(0));

    let s1 = schedule(&card.schedule(), 5, day(0)).unwrap();
    assert_eq!((s1.repetitions, s1.interval), (1, 1));
    assert_eq!(s1.next_review, day(1));

    let s2 = schedule(&s1, 5, day(1)).unwrap();
    assert_eq!((s2.repetitions, s2.interval), (2, 6));
    assert_eq!(s2.next_review, day(7));

    let s3 = schedule(&s2, 5, day(7)).unwrap();
    assert!((s3.ef - 2.8).abs() < 1e-9);
    assert_eq!(s3.repetitions, 3);
    assert_eq!(s3.interval, 17);
    assert_eq!(s3.next_review, day(24));
}

#[test]
fn lapse_after_long_streak() {
    let s = Schedule {
        ef: 2.0,
        interval: 20,
        repetitions: 5,
        next_review: day(0),
    };
    let out = schedule(&s, 1, day(0)).unwrap();
    assert_eq!(out.repetitions, 0);
    assert_eq!(out.interval, 1);
    assert!((out.ef - 1.46).abs() < 1e-9);

    let low = Schedule { ef: 1.5, ..s };
    assert_eq!(schedule(&low, 1, day(0)).unwrap().ef, EF_MIN);
}

#[test]
fn invalid_quality_is_rejected() {
    let s = Schedule::initial(day(0));
    for q in [-3, 6, 100] {
        assert!(matches!(schedule(&s, q, day(0)), Err(CoreError::InvalidInput(_))));
    }
}
