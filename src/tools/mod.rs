pub mod bit_tree;
