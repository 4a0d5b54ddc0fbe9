use std::collections::VecDeque;

use tracing::{debug, info};

use juso_core::{Batch, BatchType, RawContact};

use crate::region::classify_region;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Contacts of one region, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGroup {
    pub region: &'static str,
    pub contacts: Vec<RawContact>,
}

struct PoolItem {
    region: &'static str,
    from_large_region: bool,
    /// How many of this region's contacts went into the pool.
    pooled_from_region: usize,
    contact: RawContact,
}

/// Packs contacts into region-coherent batches of at most `batch_size`.
#[derive(Debug, Clone, Copy)]
pub struct GeographicPlanner {
    batch_size: usize,
}

impl Default for GeographicPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl GeographicPlanner {
    /// A zero batch size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Bucket contacts by region, buckets in first-appearance order.
    pub fn group_by_region(&self, contacts: Vec<RawContact>) -> Vec<RegionGroup> {
        let mut groups: Vec<RegionGroup> = Vec::new();
        for contact in contacts {
            let region = classify_region(contact.location_text());
            match groups.iter_mut().find(|g| g.region == region) {
                Some(group) => group.contacts.push(contact),
                None => groups.push(RegionGroup {
                    region,
                    contacts: vec![contact],
                }),
            }
        }
        groups
    }

    /// Plan batches. Entry offsets are assigned in batch order.
    pub fn plan(&self, contacts: Vec<RawContact>) -> Vec<Batch> {
        let total = contacts.len();
        let mut groups = self.group_by_region(contacts);
        // Stable: equal-sized regions keep first-appearance order.
        groups.sort_by(|a, b| b.contacts.len().cmp(&a.contacts.len()));

        let mut batches = Vec::new();
        let mut pool: VecDeque<PoolItem> = VecDeque::new();

        for group in groups {
            let region = group.region;
            let from_large_region = group.contacts.len() >= self.batch_size;
            let mut contacts = group.contacts.into_iter().peekable();

            if from_large_region {
                loop {
                    let chunk: Vec<RawContact> = contacts.by_ref().take(self.batch_size).collect();
                    if chunk.len() < self.batch_size {
                        let pooled_from_region = chunk.len();
                        pool.extend(chunk.into_iter().map(|contact| PoolItem {
                            region,
                            from_large_region,
                            pooled_from_region,
                            contact,
                        }));
                        break;
                    }
                    debug!(region, size = chunk.len(), "Full region batch");
                    batches.push(Batch {
                        region: region.to_string(),
                        contacts: chunk,
                        batch_type: BatchType::LargeRegionFull,
                        entry_offset: 0,
                    });
                    if contacts.peek().is_none() {
                        break;
                    }
                }
            } else {
                let pooled_from_region = contacts.len();
                pool.extend(contacts.map(|contact| PoolItem {
                    region,
                    from_large_region,
                    pooled_from_region,
                    contact,
                }));
            }
        }

        while !pool.is_empty() {
            let take = self.batch_size.min(pool.len());
            let drawn: Vec<PoolItem> = pool.drain(..take).collect();
            batches.push(remainder_batch(drawn));
        }

        assign_entry_offsets(&mut batches);

        info!(
            contacts = total,
            batches = batches.len(),
            batch_size = self.batch_size,
            "Geographic batch plan ready"
        );
        batches
    }
}

/// Set each batch's offset to 1 + the sizes of all batches before it.
pub fn assign_entry_offsets(batches: &mut [Batch]) {
    let mut next: u32 = 1;
    for batch in batches.iter_mut() {
        batch.entry_offset = next;
        next += batch.len() as u32;
    }
}

fn remainder_batch(drawn: Vec<PoolItem>) -> Batch {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for item in &drawn {
        match counts.iter_mut().find(|(r, _)| *r == item.region) {
            Some((_, n)) => *n += 1,
            None => counts.push((item.region, 1)),
        }
    }

    let (region, batch_type) = if counts.len() == 1 {
        // A small region split across two draws is not complete in either.
        let batch_type = if drawn[0].from_large_region {
            BatchType::LargeRegionRemainder
        } else if counts[0].1 == drawn[0].pooled_from_region {
            BatchType::SmallRegionComplete
        } else {
            BatchType::MixedRegionsOptimized
        };
        (counts[0].0.to_string(), batch_type)
    } else {
        let label = counts
            .iter()
            .map(|(r, n)| format!("{r}({n})"))
            .collect::<Vec<_>>()
            .join(" + ");
        (label, BatchType::MixedRegionsOptimized)
    };

    Batch {
        region,
        contacts: drawn.into_iter().map(|item| item.contact).collect(),
        batch_type,
        entry_offset: 0,
    }
}
