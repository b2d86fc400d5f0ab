//! End-to-end lifecycle scenarios for the arena: chunk overflow and
//! detach behaviour, stride families, clear-and-reuse, and validation
//! semantics across a slot's whole life.

use warren_arena::{Arena, ArenaConfig, ArenaError, EntityRef, SLOT_COUNT};

#[derive(Clone, Copy, PartialEq, Debug)]
struct GraphNode {
    first_edge: u32,
    weight: f32,
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct TreeNode {
    left: EntityRef,
    right: EntityRef,
    key: i64,
}

#[test]
fn forty_objects_span_two_chunks_and_detach_independently() {
    let arena = Arena::single_threaded();
    let mut refs = Vec::new();
    for i in 0..40u32 {
        refs.push(arena.create_local(i).unwrap());
    }

    // 32-slot chunks: the 33rd allocation opened a second chunk.
    assert_eq!(arena.chunk_count(), 2);
    assert!(refs[..SLOT_COUNT]
        .iter()
        .all(|r| r.handle.chunk_index() == 0));
    assert!(refs[SLOT_COUNT..]
        .iter()
        .all(|r| r.handle.chunk_index() == 1));

    // Both chunks are live, so the global walk sees all 40 objects.
    assert_eq!(arena.iter().count(), 40);

    // Drain the first chunk; it detaches while the second stays listed.
    for r in &refs[..SLOT_COUNT] {
        arena.free(*r).unwrap();
    }
    assert_eq!(arena.live_count(), 8);
    let listed: Vec<EntityRef> = arena.iter().collect();
    assert_eq!(listed.len(), 8);
    assert!(listed.iter().all(|r| r.handle.chunk_index() == 1));

    // Drain the second chunk; the list is now empty.
    for r in &refs[SLOT_COUNT..] {
        arena.free(*r).unwrap();
    }
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.iter().count(), 0);
}

#[test]
fn different_payload_types_never_share_a_chunk() {
    let arena = Arena::single_threaded();

    let node = arena
        .create_local(GraphNode {
            first_edge: 0,
            weight: 1.0,
        })
        .unwrap();
    arena.free(node).unwrap();

    // The GraphNode chunk has 32 free slots, but a TreeNode must not
    // land in it.
    let tree = arena
        .create_local(TreeNode {
            left: EntityRef::NULL,
            right: EntityRef::NULL,
            key: 42,
        })
        .unwrap();
    assert_ne!(node.handle, tree.handle);
    assert_eq!(arena.chunk_count(), 2);

    // And the families keep working independently.
    let node2 = arena
        .create_local(GraphNode {
            first_edge: 9,
            weight: 2.5,
        })
        .unwrap();
    assert_eq!(node2.handle, node.handle);
    assert_eq!(
        arena.with(node2, |n: &GraphNode| n.first_edge).unwrap(),
        9
    );
    assert_eq!(arena.with(tree, |t: &TreeNode| t.key).unwrap(), 42);
}

#[test]
fn payloads_can_reference_other_slots() {
    let mut arena = Arena::single_threaded();
    let left = arena
        .create_local(TreeNode {
            left: EntityRef::NULL,
            right: EntityRef::NULL,
            key: 1,
        })
        .unwrap();
    let right = arena
        .create_local(TreeNode {
            left: EntityRef::NULL,
            right: EntityRef::NULL,
            key: 3,
        })
        .unwrap();
    let root = arena
        .create_local(TreeNode {
            left,
            right,
            key: 2,
        })
        .unwrap();

    // Follow the stored refs like a downstream tree structure would.
    let (l, r) = arena.with(root, |n: &TreeNode| (n.left, n.right)).unwrap();
    assert_eq!(arena.with(l, |n: &TreeNode| n.key).unwrap(), 1);
    assert_eq!(arena.with(r, |n: &TreeNode| n.key).unwrap(), 3);

    // Freeing a child makes the stored ref stale, detectably.
    arena.free(l).unwrap();
    assert!(!arena.is_valid(l));
    let stale = arena.get_mut::<TreeNode>(l);
    assert!(matches!(stale, Err(ArenaError::VacantSlot { .. })));
}

#[test]
fn clear_then_reuse_preserves_chunk_identity() {
    let mut arena = Arena::new(ArenaConfig::new(2)).unwrap();
    for i in 0..50u64 {
        arena.create(0, i).unwrap();
        arena.create(1, i).unwrap();
    }
    let chunks = arena.chunk_count();
    let bytes = arena.memory_bytes();
    assert_eq!(arena.live_count(), 100);

    arena.clear();
    assert_eq!(arena.live_count(), 0);
    assert_eq!(arena.live_count_for(0).unwrap(), 0);
    assert_eq!(arena.live_count_for(1).unwrap(), 0);
    assert_eq!(arena.iter().count(), 0);

    // No chunk was released or allocated by the clear or the reuse.
    let r = arena.create(1, 7u64).unwrap();
    assert_eq!(arena.chunk_count(), chunks);
    assert_eq!(arena.memory_bytes(), bytes);
    assert!(arena.is_valid(r));
    assert_eq!(r.handle.chunk_index(), 0);
}

#[test]
fn validation_over_a_slots_whole_life() {
    let arena = Arena::single_threaded();

    let first = arena.create_local(1u16).unwrap();
    assert!(arena.is_valid(first));

    arena.free(first).unwrap();
    assert!(!arena.is_valid(first));

    // Reuse: same coordinates, later generation.
    let second = arena.create_local(2u16).unwrap();
    assert_eq!((second.handle, second.slot), (first.handle, first.slot));
    assert!(second.generation > first.generation);
    assert!(!arena.is_valid(first));
    assert!(arena.is_valid(second));

    // Stale free fails with a version error and leaves the occupant.
    assert!(matches!(
        arena.free(first),
        Err(ArenaError::StaleHandle { .. })
    ));
    assert_eq!(arena.with(second, |v: &u16| *v).unwrap(), 2);

    // Real free, then double free fails with a vacancy error.
    arena.free(second).unwrap();
    assert!(matches!(
        arena.free(second),
        Err(ArenaError::VacantSlot { .. })
    ));
}

#[test]
fn per_thread_counts_are_independent() {
    let arena = Arena::new(ArenaConfig::new(3)).unwrap();
    let mut by_thread: Vec<Vec<EntityRef>> = vec![Vec::new(); 3];
    for thread in 0..3 {
        for i in 0..(10 * (thread + 1)) as u32 {
            by_thread[thread].push(arena.create(thread, i).unwrap());
        }
    }
    assert_eq!(arena.live_count_for(0).unwrap(), 10);
    assert_eq!(arena.live_count_for(1).unwrap(), 20);
    assert_eq!(arena.live_count_for(2).unwrap(), 30);
    assert_eq!(arena.live_count(), 60);

    for r in by_thread[1].drain(..) {
        arena.free(r).unwrap();
    }
    assert_eq!(arena.live_count_for(1).unwrap(), 0);
    assert_eq!(arena.live_count(), 40);
    assert_eq!(arena.iter_thread(1).unwrap().count(), 0);
    assert_eq!(arena.iter_thread(2).unwrap().count(), 30);
}
