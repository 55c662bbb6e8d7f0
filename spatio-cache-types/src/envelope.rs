use geo::{Polygon, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding rectangle in a planar coordinate system.
///
/// `Envelope` is an immutable value type: every operation that combines two
/// envelopes returns a new one. It wraps `geo::Rect`, whose constructor
/// normalises the corners, so `min <= max` always holds on both axes.
///
/// # Examples
///
/// ```
/// use spatio_cache_types::envelope::Envelope;
///
/// let viewport = Envelope::new(0.0, 0.0, 10.0, 10.0);
/// let tile = Envelope::new(2.0, 2.0, 5.0, 5.0);
///
/// assert!(viewport.contains(&tile));
/// assert_eq!(viewport.union(&tile), viewport);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    rect: Rect<f64>,
}

impl Envelope {
    /// Create an envelope from two corners. Swapped bounds are normalised.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// A degenerate envelope covering a single coordinate.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Create an envelope from a `geo::Rect`.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self { rect }
    }

    /// The smallest envelope covering every envelope in `envelopes`.
    ///
    /// Returns `None` for an empty iterator.
    pub fn bounds_of<'a, I>(envelopes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Envelope>,
    {
        envelopes
            .into_iter()
            .fold(None, |acc: Option<Envelope>, env| match acc {
                Some(bounds) => Some(bounds.union(env)),
                None => Some(*env),
            })
    }

    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Whether all four bounds are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.min_x(), self.min_y(), self.max_x(), self.max_y()]
            .iter()
            .all(|v| v.is_finite())
    }

    /// The underlying `geo::Rect`.
    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// The envelope as a closed polygon ring.
    pub fn to_polygon(&self) -> Polygon<f64> {
        self.rect.to_polygon()
    }

    /// Check whether two envelopes share at least one point (boundaries included).
    pub fn intersects(&self, other: &Envelope) -> bool {
        !(self.max_x() < other.min_x()
            || self.min_x() > other.max_x()
            || self.max_y() < other.min_y()
            || self.min_y() > other.max_y())
    }

    /// Check whether `other` lies entirely within this envelope.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }

    /// The smallest envelope covering both inputs.
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope::new(
            self.min_x().min(other.min_x()),
            self.min_y().min(other.min_y()),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// The shared area of two envelopes, or `None` when they are disjoint.
    ///
    /// Envelopes that only touch produce a degenerate (zero-width or
    /// zero-height) intersection.
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope::new(
            self.min_x().max(other.min_x()),
            self.min_y().max(other.min_y()),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        ))
    }

    /// Subtract `other` from this envelope.
    ///
    /// The remainder is returned as up to four disjoint rectangles: the full
    /// height slabs left and right of the overlap, then the slabs below and
    /// above it. An empty vector means `other` covers this envelope
    /// completely; a single element equal to `self` means nothing was
    /// removed. Pieces share their boundary with `other`, so the remainder
    /// is closed and never smaller than the true set difference.
    ///
    /// ```
    /// use spatio_cache_types::envelope::Envelope;
    ///
    /// let query = Envelope::new(5.0, 5.0, 15.0, 15.0);
    /// let cached = Envelope::new(0.0, 0.0, 10.0, 10.0);
    ///
    /// let rest = query.difference(&cached);
    /// assert_eq!(rest, vec![
    ///     Envelope::new(10.0, 5.0, 15.0, 15.0),
    ///     Envelope::new(5.0, 10.0, 10.0, 15.0),
    /// ]);
    /// ```
    pub fn difference(&self, other: &Envelope) -> Vec<Envelope> {
        let Some(overlap) = self.intersection(other) else {
            return vec![*self];
        };

        // A shared edge or corner removes nothing from a rectangle with area.
        if self.area() > 0.0 && overlap.area() == 0.0 {
            return vec![*self];
        }

        let mut pieces = Vec::with_capacity(4);

        if overlap.min_x() > self.min_x() {
            pieces.push(Envelope::new(
                self.min_x(),
                self.min_y(),
                overlap.min_x(),
                self.max_y(),
            ));
        }
        if overlap.max_x() < self.max_x() {
            pieces.push(Envelope::new(
                overlap.max_x(),
                self.min_y(),
                self.max_x(),
                self.max_y(),
            ));
        }
        if overlap.min_y() > self.min_y() {
            pieces.push(Envelope::new(
                overlap.min_x(),
                self.min_y(),
                overlap.max_x(),
                overlap.min_y(),
            ));
        }
        if overlap.max_y() < self.max_y() {
            pieces.push(Envelope::new(
                overlap.min_x(),
                overlap.max_y(),
                overlap.max_x(),
                self.max_y(),
            ));
        }

        pieces
    }

    /// Grow the envelope by `amount` in every direction.
    pub fn expand(&self, amount: f64) -> Envelope {
        Envelope::new(
            self.min_x() - amount,
            self.min_y() - amount,
            self.max_x() + amount,
            self.max_y() + amount,
        )
    }
}

impl From<Rect<f64>> for Envelope {
    fn from(rect: Rect<f64>) -> Self {
        Self::from_rect(rect)
    }
}
