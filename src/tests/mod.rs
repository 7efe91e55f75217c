mod test_neighbors;
mod test_persistence;

use crate::ratings::RatingRecord;

/// Four items, four users. Items 0 and 3 are rated identically by users 0-2,
/// item 1 follows item 0 loosely and item 2 runs against it. User 3 has not
/// rated items 0 and 3.
pub const RATINGS: [RatingRecord; 14] = [
    RatingRecord { user: 0, item: 0, value: 5.0 },
    RatingRecord { user: 0, item: 1, value: 4.0 },
    RatingRecord { user: 0, item: 2, value: 1.0 },
    RatingRecord { user: 0, item: 3, value: 5.0 },
    RatingRecord { user: 1, item: 0, value: 4.0 },
    RatingRecord { user: 1, item: 1, value: 5.0 },
    RatingRecord { user: 1, item: 2, value: 2.0 },
    RatingRecord { user: 1, item: 3, value: 4.0 },
    RatingRecord { user: 2, item: 0, value: 1.0 },
    RatingRecord { user: 2, item: 1, value: 2.0 },
    RatingRecord { user: 2, item: 2, value: 5.0 },
    RatingRecord { user: 2, item: 3, value: 1.0 },
    RatingRecord { user: 3, item: 1, value: 4.0 },
    RatingRecord { user: 3, item: 2, value: 2.0 },
];
