use tl_domain::error::Error;
use tl_domain::filters::{Filter, TaggedFilter};
use tl_domain::track::{Track, TrackInfo};
use tl_queue::{LoopMode, Queue, QueueOptions};

fn track(title: &str) -> Track {
    Track::new(
        format!("enc:{title}"),
        TrackInfo {
            identifier: title.into(),
            is_seekable: true,
            author: "tester".into(),
            length: 180_000,
            is_stream: false,
            position: 0,
            title: title.into(),
            uri: None,
            artwork_url: None,
            isrc: None,
            source_name: "http".into(),
        },
    )
}

fn titles(q: &Queue) -> Vec<String> {
    q.iter().map(|t| t.info.title.clone()).collect()
}

fn abc() -> (Queue, Track, Track, Track) {
    let (a, b, c) = (track("a"), track("b"), track("c"));
    let mut q = Queue::default();
    q.put(a.clone()).unwrap();
    q.put(b.clone()).unwrap();
    q.put(c.clone()).unwrap();
    (q, a, b, c)
}

#[test]
fn next_walks_in_order_then_fails() {
    let (mut q, a, b, c) = abc();
    assert_eq!(q.next().unwrap(), Some(a));
    assert_eq!(q.next().unwrap(), Some(b));
    assert_eq!(q.next().unwrap(), Some(c.clone()));
    assert!(matches!(q.next(), Err(Error::QueueEmpty)));
    // The cursor stays on the last track.
    assert_eq!(q.current(), Some(&c));
}

#[test]
fn next_on_empty_queue() {
    let mut q = Queue::default();
    assert!(matches!(q.next(), Err(Error::QueueEmpty)));

    let mut lenient = Queue::new(QueueOptions {
        strict: false,
        ..Default::default()
    });
    assert_eq!(lenient.next().unwrap(), None);
}

#[test]
fn exhausted_queue_picks_up_new_tracks() {
    let (mut q, _, _, c) = abc();
    for _ in 0..3 {
        q.next().unwrap();
    }
    assert_eq!(q.current(), Some(&c));
    let d = track("d");
    q.put(d.clone()).unwrap();
    assert_eq!(q.next().unwrap(), Some(d));
}

#[test]
fn loose_mode_does_not_fail_at_the_end() {
    let mut q = Queue::new(QueueOptions {
        loose_mode: true,
        ..Default::default()
    });
    q.put(track("a")).unwrap();
    q.next().unwrap();
    assert_eq!(q.next().unwrap(), None);
}

#[test]
fn track_loop_repeats_current() {
    let (mut q, a, _, _) = abc();
    assert_eq!(q.next().unwrap(), Some(a.clone()));
    q.set_loop_mode(LoopMode::Track);
    assert!(q.is_looping());
    for _ in 0..5 {
        assert_eq!(q.get().unwrap(), Some(a.clone()));
    }
}

#[test]
fn queue_loop_wraps_around() {
    let (mut q, a, _, c) = abc();
    q.set_loop_mode(LoopMode::Queue);
    q.next().unwrap();
    q.next().unwrap();
    assert_eq!(q.next().unwrap(), Some(c));
    assert_eq!(q.next().unwrap(), Some(a));
}

#[test]
fn primary_is_handed_out_once() {
    let (mut q, a, _, _) = abc();
    let urgent = track("urgent");
    q.set_primary(urgent.clone());
    assert_eq!(q.get().unwrap(), Some(urgent));
    assert!(q.primary().is_none());
    // Not in the queue, so the cursor restarts at the front.
    assert_eq!(q.get().unwrap(), Some(a));
}

#[test]
fn prev_moves_back_and_stops_at_front() {
    let (mut q, a, b, _) = abc();
    q.next().unwrap();
    q.next().unwrap();
    assert_eq!(q.current(), Some(&b));
    assert_eq!(q.prev().unwrap(), Some(a.clone()));
    assert_eq!(q.prev().unwrap(), None);
    assert_eq!(q.current(), Some(&a));
}

#[test]
fn prev_without_cursor_starts_at_front() {
    let (mut q, a, _, _) = abc();
    assert_eq!(q.prev().unwrap(), Some(a));
}

#[test]
fn removing_current_moves_cursor_back() {
    let (mut q, a, b, c) = abc();
    q.next().unwrap();
    q.next().unwrap();
    q.remove(&b).unwrap();
    assert_eq!(q.current(), Some(&a));
    assert_eq!(q.next().unwrap(), Some(c));
}

#[test]
fn pop_defaults_to_last() {
    let (mut q, _, _, c) = abc();
    assert_eq!(q.pop(None).unwrap(), Some(c));
    assert_eq!(titles(&q), ["a", "b"]);
    assert!(matches!(q.pop(Some(10)), Err(Error::QueueItemNotFound)));
}

#[test]
fn remove_missing_track() {
    let (mut q, _, _, _) = abc();
    assert!(matches!(q.remove(&track("zz")), Err(Error::QueueItemNotFound)));
}

#[test]
fn shuffle_pins_current_first() {
    let mut q = Queue::default();
    let tracks: Vec<Track> = (0..20).map(|i| track(&format!("t{i}"))).collect();
    q.put_list(tracks).unwrap();
    q.next().unwrap();
    q.next().unwrap();
    let current = q.current().cloned().unwrap();

    for _ in 0..10 {
        q.shuffle();
        assert_eq!(q.get_at(0), Some(&current));
        assert_eq!(q.len(), 20);
    }
}

#[test]
fn jump_sets_cursor() {
    let (mut q, _, b, c) = abc();
    assert_eq!(q.jump(&b).unwrap(), Some(b));
    assert_eq!(q.next().unwrap(), Some(c));
}

#[test]
fn jump_rejected_while_looping_track() {
    let (mut q, _, b, _) = abc();
    q.next().unwrap();
    q.set_loop_mode(LoopMode::Track);
    assert!(matches!(q.jump(&b), Err(Error::QueueLoopingTrack)));
    assert!(matches!(q.jump(&track("zz")), Err(Error::QueueLoopingTrack)));
}

#[test]
fn jump_to_missing_track() {
    let (mut q, _, _, _) = abc();
    assert!(matches!(q.jump(&track("zz")), Err(Error::QueueItemNotFound)));
    assert!(matches!(q.jump_to(99), Err(Error::QueueItemNotFound)));
}

#[test]
fn move_item_reorders() {
    let (mut q, a, _, _) = abc();
    q.move_item(&a, 2).unwrap();
    assert_eq!(titles(&q), ["b", "c", "a"]);
    q.move_item(&a, 100).unwrap();
    assert_eq!(titles(&q), ["b", "c", "a"]);
    assert!(matches!(
        q.move_item(&track("zz"), 0),
        Err(Error::QueueItemNotFound)
    ));
}

#[test]
fn full_queue_rejects_without_overflow() {
    let mut q = Queue::new(QueueOptions {
        max_size: Some(2),
        overflow: false,
        ..Default::default()
    });
    q.put(track("a")).unwrap();
    q.put(track("b")).unwrap();
    assert!(q.is_full());
    assert!(matches!(
        q.put(track("c")),
        Err(Error::QueueFull { max_size: 2 })
    ));
    assert_eq!(titles(&q), ["a", "b"]);
}

#[test]
fn full_queue_drops_tail_with_overflow() {
    let mut q = Queue::with_max_size(2);
    q.put(track("a")).unwrap();
    q.put(track("b")).unwrap();
    q.put(track("c")).unwrap();
    assert_eq!(titles(&q), ["a", "c"]);

    q.put_at_front(track("z")).unwrap();
    assert_eq!(titles(&q), ["z", "a"]);
}

#[test]
fn overflow_keeps_current_track_and_advances_to_new_one() {
    let mut q = Queue::with_max_size(3);
    let (a, b, c) = (track("a"), track("b"), track("c"));
    q.put(a).unwrap();
    q.put(b).unwrap();
    q.put(c.clone()).unwrap();
    for _ in 0..3 {
        q.next().unwrap();
    }
    assert_eq!(q.current(), Some(&c));

    let d = track("d");
    q.put(d.clone()).unwrap();
    assert_eq!(titles(&q), ["a", "c", "d"]);
    assert_eq!(q.current(), Some(&c));
    assert_eq!(q.next().unwrap(), Some(d));
}

#[test]
fn overflow_drops_current_only_when_nothing_else_fits() {
    let mut q = Queue::with_max_size(1);
    let a = track("a");
    q.put(a.clone()).unwrap();
    assert_eq!(q.next().unwrap(), Some(a));

    let b = track("b");
    q.put(b.clone()).unwrap();
    assert_eq!(titles(&q), ["b"]);
    assert!(q.current().is_none());
    assert_eq!(q.next().unwrap(), Some(b));
}

#[test]
fn lenient_full_queue_is_noop() {
    let mut q = Queue::new(QueueOptions {
        max_size: Some(1),
        overflow: false,
        strict: false,
        ..Default::default()
    });
    q.put(track("a")).unwrap();
    q.put(track("b")).unwrap();
    assert_eq!(titles(&q), ["a"]);
}

#[test]
fn atomic_extend_is_all_or_nothing() {
    let mut q = Queue::new(QueueOptions {
        max_size: Some(3),
        overflow: false,
        ..Default::default()
    });
    q.put(track("a")).unwrap();
    let batch = vec![track("b"), track("c"), track("d")];
    assert!(q.extend_tracks(batch.clone(), true).is_err());
    assert_eq!(q.len(), 1);

    q.extend_tracks(batch, false).unwrap();
    assert_eq!(titles(&q), ["a", "b", "c"]);
}

#[test]
fn put_at_index_clamps() {
    let (mut q, _, _, _) = abc();
    q.put_at_index(1, track("x")).unwrap();
    q.put_at_index(99, track("y")).unwrap();
    assert_eq!(titles(&q), ["a", "x", "b", "c", "y"]);
}

#[test]
fn copies_are_independent() {
    let (q, _, _, _) = abc();
    let mut copy = q.clone();
    copy.clear();
    assert!(copy.is_empty());
    assert!(copy.current().is_none());
    assert_eq!(q.len(), 3);
}

#[test]
fn clear_track_filters_strips_overrides() {
    let mut q = Queue::default();
    let t = track("a").with_filters(vec![TaggedFilter::preload("v", Filter::Volume(2.0))]);
    q.put(t).unwrap();
    q.next().unwrap();
    q.clear_track_filters();
    assert!(q.iter().all(|t| t.filters.is_empty()));
    assert!(q.current().unwrap().filters.is_empty());
}

#[test]
fn extend_trait_and_iteration() {
    let mut q = Queue::default();
    q.extend(vec![track("a"), track("b")]);
    let collected: Vec<&str> = (&q).into_iter().map(|t| t.info.title.as_str()).collect();
    assert_eq!(collected, ["a", "b"]);
    assert_eq!(q.into_iter().count(), 2);
}
