// Start screen: flash regions and SD root entries in one wrapping list.
//
// Flash rows come first (bootloader, partition table, then the table's
// entries in flash order); SD rows follow, directories included so that
// picking one reports the failure instead of hiding it. Selecting a row
// hands back what the firmware needs to open a viewer; when that fails the
// reason is shown on the message line and the list stays up.

use core::fmt::Write;

use embedded_graphics::mono_font::MonoTextStyleBuilder;
use embedded_graphics::mono_font::iso_8859_1::{FONT_6X9, FONT_7X13_BOLD};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_storage::ReadStorage;
use log::info;

use super::Action;
use crate::drivers::partition::{self, FlashLayout, MAX_ENTRIES, ResolveError, Selector, TableEntry};
use crate::drivers::sdcard::DirEntry;
use crate::ui::{Region, Screen, StackFmt, stack_fmt, wrap_next, wrap_prev};

pub const MAX_ITEMS: usize = 32;
const LABEL_CAP: usize = 16;

const TITLE_POS: Point = Point::new(10, 8);
const LIST_TOP: u16 = 30;
const ROW_H: u16 = 12;
const VISIBLE_ROWS: usize = 15;
const MESSAGE_LINE: Region = Region::new(0, 224, 320, 16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Flash(Selector),
    File { is_dir: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub kind: ItemKind,
    pub offset: u32,
    pub size: u32,
    label: [u8; LABEL_CAP],
    label_len: u8,
}

impl Item {
    const EMPTY: Self = Self {
        kind: ItemKind::File { is_dir: false },
        offset: 0,
        size: 0,
        label: [0u8; LABEL_CAP],
        label_len: 0,
    };

    fn new(kind: ItemKind, label: &str, offset: u32, size: u32) -> Self {
        let mut item = Self {
            kind,
            offset,
            size,
            ..Self::EMPTY
        };
        let mut n = label.len().min(LABEL_CAP);
        while !label.is_char_boundary(n) {
            n -= 1;
        }
        item.label[..n].copy_from_slice(&label.as_bytes()[..n]);
        item.label_len = n as u8;
        item
    }

    pub fn label(&self) -> &str {
        core::str::from_utf8(&self.label[..self.label_len as usize]).unwrap_or("?")
    }

    fn line(&self) -> StackFmt<52> {
        stack_fmt(|w| {
            let _ = match self.kind {
                ItemKind::Flash(_) => write!(
                    w,
                    "FLASH {:<16} 0x{:06X} {:>9}",
                    self.label(),
                    self.offset,
                    self.size
                ),
                ItemKind::File { is_dir: true } => write!(w, "SD    {}/", self.label()),
                ItemKind::File { is_dir: false } => {
                    write!(w, "SD    {:<16} {:>18}", self.label(), self.size)
                }
            };
        })
    }
}

/// What to open after a Select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    Flash(Selector),
    File(Item),
}

pub struct Launcher {
    items: [Item; MAX_ITEMS],
    count: usize,
    selected: usize,
    message: StackFmt<52>,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher {
    pub const fn new() -> Self {
        Self {
            items: [Item::EMPTY; MAX_ITEMS],
            count: 0,
            selected: 0,
            message: StackFmt::new(),
        }
    }

    fn push(&mut self, item: Item) -> bool {
        if self.count >= MAX_ITEMS {
            return false;
        }
        self.items[self.count] = item;
        self.count += 1;
        true
    }

    /// Add the fixed regions and every partition table entry.
    pub fn load_flash<S: ReadStorage>(
        &mut self,
        flash: &mut S,
        layout: &FlashLayout,
    ) -> Result<usize, ResolveError> {
        for selector in [Selector::Bootloader, Selector::PartitionTable] {
            let p = partition::resolve(flash, selector, layout)?;
            self.push(Item::new(ItemKind::Flash(selector), p.label(), p.offset, p.size));
        }

        let mut table = [TableEntry::EMPTY; MAX_ENTRIES];
        let n = partition::read_table(flash, layout, &mut table)?;
        for entry in &table[..n] {
            let selector = Selector::Lookup {
                kind: entry.kind,
                subtype: entry.subtype,
            };
            let p = &entry.partition;
            if !self.push(Item::new(ItemKind::Flash(selector), p.label(), p.offset, p.size)) {
                break;
            }
        }
        info!("launcher: {} partitions", n);
        Ok(n)
    }

    pub fn add_files(&mut self, entries: &[DirEntry]) {
        for e in entries {
            let kind = ItemKind::File { is_dir: e.is_dir };
            if !self.push(Item::new(kind, e.name_str(), 0, e.size)) {
                break;
            }
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items[..self.count]
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// One-line notice under the list, e.g. why a source did not open.
    pub fn set_message(&mut self, args: core::fmt::Arguments<'_>) {
        self.message.clear();
        let _ = self.message.write_fmt(args);
    }

    pub fn handle(&mut self, action: Action) -> Option<Launch> {
        match action {
            Action::Next => {
                self.selected = wrap_next(self.selected, self.count);
                None
            }
            Action::Prev => {
                self.selected = wrap_prev(self.selected, self.count);
                None
            }
            Action::Select => {
                let item = *self.items().get(self.selected)?;
                self.message.clear();
                Some(match item.kind {
                    ItemKind::Flash(selector) => Launch::Flash(selector),
                    ItemKind::File { .. } => Launch::File(item),
                })
            }
            Action::Back => None,
        }
    }

    // first list index on screen, keeping the selection visible
    fn window_start(&self) -> usize {
        self.selected.saturating_sub(VISIBLE_ROWS - 1)
    }

    pub fn draw<D: Screen>(&self, screen: &mut D) -> Result<(), D::Error> {
        screen.clear(Rgb565::BLACK)?;

        let title = MonoTextStyleBuilder::new()
            .font(&FONT_7X13_BOLD)
            .text_color(Rgb565::WHITE)
            .build();
        Text::with_baseline("hexpeek", TITLE_POS, title, Baseline::Top).draw(screen)?;

        let normal = MonoTextStyleBuilder::new()
            .font(&FONT_6X9)
            .text_color(Rgb565::WHITE)
            .background_color(Rgb565::BLACK)
            .build();
        let inverted = MonoTextStyleBuilder::new()
            .font(&FONT_6X9)
            .text_color(Rgb565::BLACK)
            .background_color(Rgb565::WHITE)
            .build();

        let start = self.window_start();
        let end = (start + VISIBLE_ROWS).min(self.count);
        for (slot, idx) in (start..end).enumerate() {
            let row = Region::new(0, LIST_TOP + slot as u16 * ROW_H, screen.width(), ROW_H);
            let style = if idx == self.selected {
                screen.fill_solid(&row.to_rect(), Rgb565::WHITE)?;
                inverted
            } else {
                normal
            };
            Text::with_baseline(
                self.items[idx].line().as_str(),
                row.top_left() + Point::new(2, 1),
                style,
                Baseline::Top,
            )
            .draw(screen)?;
        }

        if self.count == 0 {
            Text::with_baseline(
                "nothing to show",
                Point::new(2, LIST_TOP as i32),
                normal,
                Baseline::Top,
            )
            .draw(screen)?;
        }

        if !self.message.is_empty() {
            let msg = MonoTextStyleBuilder::new()
                .font(&FONT_6X9)
                .text_color(Rgb565::RED)
                .background_color(Rgb565::BLACK)
                .build();
            screen.fill_solid(&MESSAGE_LINE.to_rect(), Rgb565::BLACK)?;
            Text::with_baseline(
                self.message.as_str(),
                MESSAGE_LINE.top_left() + Point::new(2, 3),
                msg,
                Baseline::Top,
            )
            .draw(screen)?;
        }
        Ok(())
    }
}
