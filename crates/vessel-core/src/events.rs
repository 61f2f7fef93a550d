//! Timestamped events of one block.
//!
//! [`EventList`] is a pass-through view: events are read from and appended
//! to the host's list one at a time through an [`EventListBackend`]. Event
//! kinds without a typed variant travel as [`EventKind::Other`] so they are
//! never silently dropped by the view.

use std::ffi::c_void;
use std::ptr::NonNull;

// =============================================================================
// Event Types
// =============================================================================

/// Event flags as defined by the host protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags(pub u16);

impl EventFlags {
    /// The event was played live rather than read from a track.
    pub const IS_LIVE: Self = Self(1 << 0);
    pub const USER_RESERVED_1: Self = Self(1 << 14);
    pub const USER_RESERVED_2: Self = Self(1 << 15);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOn {
    pub channel: i16,
    pub pitch: i16,
    pub tuning: f32,
    pub velocity: f32,
    pub length: i32,
    /// -1 when the host does not track note ids.
    pub note_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOff {
    pub channel: i16,
    pub pitch: i16,
    pub velocity: f32,
    pub note_id: i32,
    pub tuning: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyPressure {
    pub channel: i16,
    pub pitch: i16,
    pub pressure: f32,
    pub note_id: i32,
}

/// A block of raw bytes, usually a system exclusive message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEvent<'a> {
    /// 0 is MIDI system exclusive.
    pub kind: u32,
    pub bytes: &'a [u8],
}

impl DataEvent<'_> {
    pub const MIDI_SYSEX: u32 = 0;
}

/// A legacy MIDI controller message sent from plugin to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyMidiCcOut {
    /// 0-127 are controllers; 128 channel pressure, 129 pitch bend, 130 program change.
    pub control_number: u8,
    pub channel: i8,
    pub value: i8,
    pub value2: i8,
}

/// Payload of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind<'a> {
    NoteOn(NoteOn),
    NoteOff(NoteOff),
    PolyPressure(PolyPressure),
    Data(DataEvent<'a>),
    LegacyMidiCcOut(LegacyMidiCcOut),
    /// An event type without a typed variant, e.g. note expression or chord.
    Other { type_id: u16 },
}

impl EventKind<'_> {
    /// Wire type id of this kind.
    pub fn type_id(&self) -> u16 {
        match self {
            Self::NoteOn(_) => 0,
            Self::NoteOff(_) => 1,
            Self::Data(_) => 2,
            Self::PolyPressure(_) => 3,
            Self::LegacyMidiCcOut(_) => 65535,
            Self::Other { type_id } => *type_id,
        }
    }
}

/// One timestamped event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<'a> {
    pub bus_index: i32,
    /// Offset into the block, in samples.
    pub sample_offset: i32,
    /// Musical position in quarter notes, if the host provides one.
    pub ppq_position: f64,
    pub flags: EventFlags,
    pub kind: EventKind<'a>,
}

impl<'a> Event<'a> {
    pub fn new(sample_offset: i32, kind: EventKind<'a>) -> Self {
        Self {
            bus_index: 0,
            sample_offset,
            ppq_position: 0.0,
            flags: EventFlags::default(),
            kind,
        }
    }
}

// =============================================================================
// EventList
// =============================================================================

/// Access to a foreign event list.
///
/// # Safety
///
/// Implementations must only be called with handles obtained from the same
/// backend. Events returned by [`event`](Self::event) may borrow host memory
/// and are valid only while the list is.
pub unsafe trait EventListBackend {
    unsafe fn event_count(&self, list: NonNull<c_void>) -> usize;

    unsafe fn event<'a>(&self, list: NonNull<c_void>, index: usize) -> Option<Event<'a>>;

    /// Append an event. Returns false when the host rejects it.
    unsafe fn add_event(&self, list: NonNull<c_void>, event: &Event<'_>) -> bool;
}

/// The events of one block, in host order.
#[derive(Clone, Copy)]
pub struct EventList<'a> {
    backend: &'a dyn EventListBackend,
    list: NonNull<c_void>,
}

impl<'a> EventList<'a> {
    /// Wrap a foreign list.
    ///
    /// # Safety
    ///
    /// `list` must be a live handle understood by `backend` for all of `'a`.
    pub unsafe fn from_raw(backend: &'a dyn EventListBackend, list: NonNull<c_void>) -> Self {
        Self { backend, list }
    }

    #[inline]
    pub fn len(&self) -> usize {
        // Safety: from_raw contract
        unsafe { self.backend.event_count(self.list) }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn event(&self, index: usize) -> Option<Event<'a>> {
        // Safety: from_raw contract; events borrow host memory for 'a
        unsafe { self.backend.event(self.list, index) }
    }

    /// Append an event. Data bytes must stay alive until the block ends.
    pub fn add(&self, event: &Event<'a>) -> bool {
        // Safety: from_raw contract
        unsafe { self.backend.add_event(self.list, event) }
    }

    pub fn iter(&self) -> impl Iterator<Item = Event<'a>> + '_ {
        (0..self.len()).filter_map(move |i| self.event(i))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;

    use super::*;

    /// In-memory event list. Data events keep `'static` bytes.
    #[derive(Default)]
    pub struct TestEvents {
        pub events: RefCell<Vec<Event<'static>>>,
    }

    impl TestEvents {
        pub fn handle(&self) -> NonNull<c_void> {
            NonNull::from(self).cast()
        }
    }

    pub struct TestEventBackend;

    unsafe impl EventListBackend for TestEventBackend {
        unsafe fn event_count(&self, list: NonNull<c_void>) -> usize {
            list.cast::<TestEvents>().as_ref().events.borrow().len()
        }

        unsafe fn event<'a>(&self, list: NonNull<c_void>, index: usize) -> Option<Event<'a>> {
            list.cast::<TestEvents>().as_ref().events.borrow().get(index).copied()
        }

        unsafe fn add_event(&self, list: NonNull<c_void>, event: &Event<'_>) -> bool {
            // Only byte-free events can be stored with a 'static lifetime
            let kind = match event.kind {
                EventKind::Data(_) => return false,
                EventKind::NoteOn(e) => EventKind::NoteOn(e),
                EventKind::NoteOff(e) => EventKind::NoteOff(e),
                EventKind::PolyPressure(e) => EventKind::PolyPressure(e),
                EventKind::LegacyMidiCcOut(e) => EventKind::LegacyMidiCcOut(e),
                EventKind::Other { type_id } => EventKind::Other { type_id },
            };
            list.cast::<TestEvents>().as_ref().events.borrow_mut().push(Event { kind, ..*event });
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{TestEventBackend, TestEvents};
    use super::*;

    fn note_on(pitch: i16) -> EventKind<'static> {
        EventKind::NoteOn(NoteOn {
            channel: 0,
            pitch,
            tuning: 0.0,
            velocity: 0.8,
            length: 0,
            note_id: -1,
        })
    }

    #[test]
    fn test_reads_in_host_order() {
        let list = TestEvents::default();
        list.events.borrow_mut().push(Event::new(64, note_on(60)));
        list.events.borrow_mut().push(Event::new(0, EventKind::Other { type_id: 6 }));

        let events = unsafe { EventList::from_raw(&TestEventBackend, list.handle()) };
        assert_eq!(events.len(), 2);
        let offsets: Vec<_> = events.iter().map(|e| e.sample_offset).collect();
        assert_eq!(offsets, vec![64, 0]);
        assert_eq!(events.event(1).unwrap().kind.type_id(), 6);
        assert!(events.event(2).is_none());
    }

    #[test]
    fn test_append() {
        let list = TestEvents::default();
        let events = unsafe { EventList::from_raw(&TestEventBackend, list.handle()) };
        assert!(events.is_empty());
        assert!(events.add(&Event::new(12, note_on(64))));
        assert_eq!(list.events.borrow()[0].sample_offset, 12);
    }

    #[test]
    fn test_type_ids() {
        let data = EventKind::Data(DataEvent {
            kind: DataEvent::MIDI_SYSEX,
            bytes: &[0xF0, 0xF7],
        });
        assert_eq!(data.type_id(), 2);
        assert_eq!(note_on(1).type_id(), 0);
        assert!(EventFlags(3).contains(EventFlags::IS_LIVE));
    }
}
