//! In-place quadratic sorts used by catalog views.
//!
//! Catalogs are folder-sized, so these stay simple. Each helper only
//! swaps or shifts elements when the comparator reports `Greater`,
//! which keeps exchange and insertion sort stable.

use std::cmp::Ordering;


/// Adjacent-swap exchange sort.
pub fn exchange_sort<T, F>( items: &mut [T], mut compare: F )
where
    F: FnMut( &T, &T ) -> Ordering,
{
    let len = items.len();
    for pass in 0..len {
        let mut swapped = false;
        for j in 0..len.saturating_sub( 1 + pass ) {
            if compare( &items[ j ], &items[ j + 1 ] ) == Ordering::Greater {
                items.swap( j, j + 1 );
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
}


/// Insertion sort, shifting larger elements right.
pub fn insertion_sort<T, F>( items: &mut [T], mut compare: F )
where
    F: FnMut( &T, &T ) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare( &items[ j - 1 ], &items[ j ] ) == Ordering::Greater {
            items.swap( j - 1, j );
            j -= 1;
        }
    }
}


/// Selection sort: repeatedly moves the minimum of the unsorted tail to
/// the front. Not stable.
pub fn selection_sort<T, F>( items: &mut [T], mut compare: F )
where
    F: FnMut( &T, &T ) -> Ordering,
{
    let len = items.len();
    for i in 0..len.saturating_sub( 1 ) {
        let mut low = i;
        for j in ( i + 1 )..len {
            if compare( &items[ low ], &items[ j ] ) == Ordering::Greater {
                low = j;
            }
        }
        items.swap( low, i );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_exchange_sort_orders_ascending() {
        let mut v = vec![ 5, 1, 4, 2, 3 ];
        exchange_sort( &mut v, |a, b| a.cmp( b ) );
        assert_eq!( v, vec![ 1, 2, 3, 4, 5 ] );
    }


    #[test]
    fn test_insertion_sort_is_stable() {
        let mut v = vec![ ( 2, 'a' ), ( 1, 'b' ), ( 2, 'c' ), ( 1, 'd' ) ];
        insertion_sort( &mut v, |a, b| a.0.cmp( &b.0 ) );
        assert_eq!( v, vec![ ( 1, 'b' ), ( 1, 'd' ), ( 2, 'a' ), ( 2, 'c' ) ] );
    }


    #[test]
    fn test_exchange_sort_is_stable() {
        let mut v = vec![ ( "b", 0 ), ( "a", 1 ), ( "b", 2 ), ( "a", 3 ) ];
        exchange_sort( &mut v, |a, b| a.0.cmp( b.0 ) );
        assert_eq!( v, vec![ ( "a", 1 ), ( "a", 3 ), ( "b", 0 ), ( "b", 2 ) ] );
    }


    #[test]
    fn test_selection_sort_orders_ascending() {
        let mut v = vec![ 900_u64, 12, 12_000, 1, 45 ];
        selection_sort( &mut v, |a, b| a.cmp( b ) );
        assert_eq!( v, vec![ 1, 12, 45, 900, 12_000 ] );
    }


    #[test]
    fn test_sorts_handle_empty_and_single() {
        let mut empty: Vec<u8> = Vec::new();
        exchange_sort( &mut empty, |a, b| a.cmp( b ) );
        insertion_sort( &mut empty, |a, b| a.cmp( b ) );
        selection_sort( &mut empty, |a, b| a.cmp( b ) );
        assert!( empty.is_empty() );

        let mut one = vec![ 7 ];
        selection_sort( &mut one, |a, b| a.cmp( b ) );
        assert_eq!( one, vec![ 7 ] );
    }
}
