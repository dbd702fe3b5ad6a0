use crate::patch::{Patch, ZoneAddress};

/// Collect every zone that should sound `key` on `channel` into `out`.
///
/// A straight scan of the whole tree: parts on the note's channel (or omni),
/// all their groups, every zone whose range holds the key. Overlapping zones
/// all fire, in tree order, with no tie-breaking. A per-channel key index
/// would make this cheaper but has to keep that exact result.
pub fn resolve_targets(patch: &Patch, channel: u8, key: i32, out: &mut Vec<ZoneAddress>) {
    out.clear();
    for (p, part) in patch.parts().iter().enumerate() {
        if !part.channel().matches(channel) {
            continue;
        }
        for (g, group) in part.groups().iter().enumerate() {
            for (z, zone) in group.zones().iter().enumerate() {
                if zone.key_range().includes(key) {
                    out.push(ZoneAddress::new(p, g, z));
                }
            }
        }
    }
}
