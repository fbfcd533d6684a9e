use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
    pub ignore_case: bool,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
            ignore_case: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    pub fn and(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }
}

/// Requested window of a result set, expressed as an offset and a page size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pageable {
    offset: u64,
    size: Option<u64>,
    sort: Sort,
}

impl Pageable {
    /// Page `number` (zero-based) of `size` rows
    pub fn of(number: u64, size: u64) -> Self {
        Self {
            offset: number.saturating_mul(size),
            size: Some(size),
            sort: Sort::unsorted(),
        }
    }

    pub fn at_offset(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size: Some(size),
            sort: Sort::unsorted(),
        }
    }

    /// No row window; may still carry a sort.
    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn sorted(sort: Sort) -> Self {
        Self::unpaged().with_sort(sort)
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn is_unpaged(&self) -> bool {
        self.size.is_none()
    }

    /// Same offset and sort, one row.
    pub fn single_row(&self) -> Self {
        Self {
            offset: self.offset,
            size: Some(1),
            sort: self.sort.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        let page = Pageable::of(2, 10);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.size(), Some(10));
        assert!(!page.is_unpaged());

        let single = page.single_row();
        assert_eq!(single.offset(), 20);
        assert_eq!(single.size(), Some(1));
    }

    #[test]
    fn test_huge_page_number_saturates() {
        let page = Pageable::of(u64::MAX, 50);
        assert_eq!(page.offset(), u64::MAX);
        assert_eq!(page.size(), Some(50));
    }

    #[test]
    fn test_sort_builder() {
        let sort = Sort::unsorted().and(Order::asc("title")).and(Order::desc("id"));
        assert!(sort.is_sorted());
        assert_eq!(sort.orders().len(), 2);
        assert!(Pageable::sorted(sort).is_unpaged());
    }
}
