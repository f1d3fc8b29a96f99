mod callbacks;
mod catalogue;
mod donations;
mod helpers;
mod mocks;
